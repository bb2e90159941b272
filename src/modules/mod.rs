pub mod message {
    pub mod schema;
    pub mod model;
    pub mod repository;
    pub mod repository_pg;
    pub mod service;
    pub mod store;
}

pub mod conversation {
    pub mod schema;
    pub mod model;
    pub mod repository;
    pub mod repository_pg;
    pub mod cache;
    pub mod service;
    pub mod sidebar;
    pub mod handle;
    pub mod route;
}

pub mod link_preview {
    pub mod fetcher;
    pub mod resolver;
}

pub mod chat {
    pub mod assistant;
    pub mod events;
    pub mod message;
    pub mod model;
    pub mod window;
    pub mod handler;
    pub mod route;
}

pub mod file_upload;
pub mod realtime;
