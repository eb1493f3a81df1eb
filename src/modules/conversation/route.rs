use actix_web::web::{scope, ServiceConfig};

use crate::modules::conversation::handle::*;

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(
        scope("/conversations")
            .service(get_conversations)
            .service(create_direct)
            .service(create_group)
            .service(add_member)
            .service(remove_member)
            .service(leave_group)
            .service(promote_to_admin)
            .service(rename_group),
    );
}
