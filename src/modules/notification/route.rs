use actix_web::web::{scope, ServiceConfig};

use crate::modules::notification::handle::*;

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(scope("/notifications").service(get_settings).service(update_settings));
}
