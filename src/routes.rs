use actix_files::Files;
use actix_web::web;

use crate::config::PUBLIC_DIR;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.configure(crate::health::configure)
        .route("/ws", web::get().to(crate::ws::connection::upgrade))
        .service(Files::new("/", PUBLIC_DIR).index_file("index.html"));
}
