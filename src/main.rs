use actix::Actor;
use actix_web::{
    middleware::{from_fn, Logger},
    web, App, HttpServer,
};
use std::sync::{Arc, LazyLock};

use crate::{
    configs::{connect_database, create_redis_pool},
    middlewares::authentication,
    modules::{
        conversation::{
            handle::ConversationSvc,
            repository_pg::{ConversationRepositoryPg, MembershipRepositoryPg},
            service::ConversationService,
        },
        delivery::orchestrator::DeliveryOrchestrator,
        membership::{
            resolver::MembershipResolver,
            source::MembershipSource,
            source_pg::{
                DefaultGroupMembershipSourcePg, GroupMembershipSourcePg, ParticipantSourcePg,
            },
        },
        message::{repository_pg::MessageRepositoryPg, store::MessageStore},
        notification::{
            engine::{NotificationEngine, SuppressionPolicy},
            push::LogPushSink,
            repository_pg::{NotificationRepositoryPg, SettingsRepositoryPg},
        },
        presence::registry::PresenceRegistry,
        websocket::server::{ConnectionHub, EventSink},
    },
};

mod api;
mod configs;
mod constants;
mod middlewares;
mod modules;
mod utils;

pub static ENV: LazyLock<constants::Env> = LazyLock::new(|| {
    dotenvy::dotenv().ok();
    constants::Env::default()
});

#[actix_web::get("/")]
async fn health_check() -> &'static str {
    "Server is running"
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt::init();

    let db_pool =
        connect_database().await.map_err(|_| std::io::Error::other("Database connection error"))?;
    let redis_pool =
        create_redis_pool().map_err(|_| std::io::Error::other("Redis pool creation error"))?;

    // Connection Hub: một actor sở hữu toàn bộ topic subscriptions
    let hub = ConnectionHub::new().start();

    let conversation_repo = Arc::new(ConversationRepositoryPg::new(db_pool.clone()));
    let membership_repo = Arc::new(MembershipRepositoryPg::new(db_pool.clone()));
    let message_repo = Arc::new(MessageRepositoryPg::new(db_pool.clone()));
    let notification_repo = Arc::new(NotificationRepositoryPg::new(db_pool.clone()));
    let settings_repo = Arc::new(SettingsRepositoryPg::new(db_pool.clone()));
    let presence = PresenceRegistry::new(redis_pool);

    // Membership resolver: union của 3 nguồn membership
    let sources: Vec<Arc<dyn MembershipSource>> = vec![
        Arc::new(ParticipantSourcePg::new(db_pool.clone())),
        Arc::new(GroupMembershipSourcePg::new(db_pool.clone())),
        Arc::new(DefaultGroupMembershipSourcePg::new(db_pool.clone())),
    ];
    let resolver = Arc::new(MembershipResolver::new(conversation_repo.clone(), sources));

    let store = Arc::new(MessageStore::new(message_repo, resolver.clone()));
    let engine = Arc::new(NotificationEngine::new(
        notification_repo,
        settings_repo.clone(),
        Arc::new(presence.clone()),
        // suppress-when-online là policy hook, mặc định tắt
        SuppressionPolicy::default(),
    ));

    let sink: Arc<dyn EventSink> = Arc::new(hub.clone());
    let push = Arc::new(LogPushSink);

    let orchestrator = web::Data::new(DeliveryOrchestrator::new(
        conversation_repo.clone(),
        resolver,
        store.clone(),
        engine.clone(),
        sink.clone(),
        push,
    ));

    let conversation_service: web::Data<ConversationSvc> =
        web::Data::new(ConversationService::with_dependencies(
            conversation_repo.clone(),
            membership_repo,
            store,
            engine,
            sink,
        ));

    let hub_data = web::Data::new(hub);
    let presence_data = web::Data::new(presence);
    let conversation_repo_data = web::Data::from(conversation_repo);
    let settings_repo_data = web::Data::from(settings_repo);

    println!("Starting server at http://{}:{}", ENV.ip.as_str(), ENV.port);
    HttpServer::new(move || {
        let cors = actix_cors::Cors::default()
            .allowed_origin(ENV.frontend_url.as_str())
            .allow_any_method()
            .allow_any_header()
            .supports_credentials();

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(web::Data::new(db_pool.clone()))
            .app_data(hub_data.clone())
            .app_data(presence_data.clone())
            .app_data(conversation_repo_data.clone())
            .app_data(settings_repo_data.clone())
            .app_data(orchestrator.clone())
            .app_data(conversation_service.clone())
            .service(health_check)
            .service(
                web::scope("/api")
                    .wrap(from_fn(authentication))
                    .configure(modules::conversation::route::configure)
                    .configure(modules::notification::route::configure)
                    .configure(modules::presence::route::configure),
            )
            .service(web::scope("/ws").configure(modules::websocket::configure))
    })
    .bind((ENV.ip.as_str(), ENV.port))?
    .workers(2)
    .run()
    .await
}
