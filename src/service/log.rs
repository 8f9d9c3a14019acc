use std::future::{ready, Ready};
use std::io::Write;
use std::time::Instant;

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use colored::Colorize;
use env_logger::Builder;
use futures_util::future::LocalBoxFuture;
use log::{info, Level};

pub fn init_logger() {
    Builder::from_default_env()
        .parse_default_env()
        .format(|buf, record| {
            let level = match record.level() {
                Level::Error => "ERROR".red().bold(),
                Level::Warn => "WARN".yellow().bold(),
                Level::Info => "INFO".green().bold(),
                Level::Debug => "DEBUG".blue().bold(),
                Level::Trace => "TRACE".purple().bold(),
            };
            writeln!(buf, "{} - {}", level, record.args())
        })
        .init()
}

pub struct LoggerMiddleware;

impl<S, B> Transform<S, ServiceRequest> for LoggerMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = LoggerMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(LoggerMiddlewareService { service }))
    }
}

pub struct LoggerMiddlewareService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for LoggerMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let started = Instant::now();
        info!("request: {} {}", req.method(), req.uri());
        let fut = self.service.call(req);

        Box::pin(async move {
            let res = fut.await?;
            info!(
                "response: {} ({} ms)",
                res.status(),
                started.elapsed().as_millis()
            );
            Ok(res)
        })
    }
}
