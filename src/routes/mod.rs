pub mod auth;
pub mod health;
pub mod tasks;

use actix_web::web;

use crate::auth::AuthGuard;

/// Mounts the /auth and /tasks scopes. Caller nests this under /v1; the
/// bearer-token guard wraps only the task scope.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .service(auth::register)
            .service(auth::login),
    )
    .service(
        web::scope("/tasks")
            .wrap(AuthGuard)
            .service(tasks::list_tasks)
            .service(tasks::create_task)
            .service(tasks::get_task)
            .service(tasks::update_task)
            .service(tasks::complete_task)
            .service(tasks::delete_task),
    );
}
