use actix::Actor;
use actix_cors::Cors;
use actix_web::{self, middleware::Logger, web, App, HttpServer};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use crate::{
    configs::{connect_database, RedisCache},
    modules::{
        chat::{assistant::AssistantScript, window::ChatDeps},
        conversation::{
            cache::{ConversationCache, RedisConversationCache},
            repository_pg::ConversationPgRepository,
            service::ConversationService,
            sidebar::SidebarDeps,
        },
        file_upload::{AttachmentUploader, LocalBlobStorage, UploadConfig},
        link_preview::fetcher::HttpLinkPreviewFetcher,
        message::{repository_pg::MessageRepositoryPg, service::MessageService},
        realtime::hub::{HubConfig, RealtimeHub},
    },
};

mod api;
mod configs;
mod constants;
mod modules;
#[cfg(test)]
mod test;
mod utils;

pub static ENV: LazyLock<constants::Env> = LazyLock::new(|| {
    dotenvy::dotenv().ok();
    env_logger::init();
    log::info!("Environment variables loaded from .env file");
    constants::Env::default()
});

#[actix_web::get("/")]
async fn health_check() -> &'static str {
    "Server is running"
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let level = ENV.log_level.parse::<tracing::Level>().unwrap_or(tracing::Level::INFO);
    if let Err(e) = tracing::subscriber::set_global_default(
        tracing_subscriber::fmt().with_max_level(level).finish(),
    ) {
        log::warn!("Tracing subscriber already installed: {}", e);
    }

    let db_pool =
        connect_database().await.map_err(|_| std::io::Error::other("Database connection error"))?;

    let redis_pool =
        RedisCache::new().await.map_err(|_| std::io::Error::other("Redis connection error"))?;

    let realtime =
        RealtimeHub::new(HubConfig { max_channels: ENV.max_realtime_channels }).start();

    let message_repo = Arc::new(MessageRepositoryPg::new(db_pool.clone()));
    let conversation_repo = Arc::new(ConversationPgRepository::new(db_pool.clone()));

    let message_service =
        MessageService::with_dependencies(message_repo, conversation_repo.clone(), realtime.clone());
    let conversation_service =
        ConversationService::with_dependencies(conversation_repo, realtime.clone());

    let storage = Arc::new(LocalBlobStorage::new(
        ENV.storage_dir.as_str(),
        ENV.storage_base_url.as_str(),
        ENV.storage_secret.as_str(),
    ));
    let uploader = AttachmentUploader::new(
        storage.clone(),
        UploadConfig {
            max_file_size: ENV.max_upload_bytes,
            signed_url_ttl: Duration::from_secs(ENV.signed_url_ttl),
        },
    );

    let previews = HttpLinkPreviewFetcher::new(ENV.link_preview_timeout)
        .map_err(|_| std::io::Error::other("Link preview client error"))?;

    let cache: Arc<dyn ConversationCache> =
        Arc::new(RedisConversationCache::new(redis_pool, ENV.chat_cache_ttl));

    let chat_deps = ChatDeps {
        messages: message_service,
        uploader,
        previews: Arc::new(previews),
        realtime: realtime.clone(),
        assistant_conversation_id: ENV.assistant_conversation_id,
        assistant_script: AssistantScript::default(),
    };
    let sidebar_deps = SidebarDeps {
        conversations: conversation_service.clone(),
        cache: cache.clone(),
        realtime,
        assistant_conversation_id: ENV.assistant_conversation_id,
    };

    tracing::info!("Starting server at http://{}:{}", ENV.ip.as_str(), ENV.port);
    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(ENV.frontend_url.as_str())
            .allow_any_method()
            .allow_any_header()
            .supports_credentials();

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(web::Data::new(conversation_service.clone()))
            .app_data(web::Data::new(chat_deps.clone()))
            .app_data(web::Data::new(sidebar_deps.clone()))
            .app_data(web::Data::from(cache.clone()))
            .app_data(web::Data::from(storage.clone()))
            .service(health_check)
            .configure(modules::chat::route::configure)
            .configure(modules::file_upload::route::configure)
            .service(web::scope("/api").configure(modules::conversation::route::configure))
    })
    .bind((ENV.ip.as_str(), ENV.port))?
    .workers(2)
    .run()
    .await
}
