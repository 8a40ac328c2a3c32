use std::sync::Arc;
use std::time::Duration;

use actix_web::web::{self, Bytes, Data, PayloadConfig};
use actix_web::{App, HttpRequest, HttpResponse, HttpServer};
use anyhow::{Context, Result};
use log::{error, info, warn};
use openssl::ssl::SslAcceptorBuilder;
use sd_notify::NotifyState;

use super::pipeline::Pipeline;
use super::request::Request;

pub struct RestfulServer {
    ssl: Option<SslAcceptorBuilder>,
    pipeline: Arc<Pipeline>,

    keep_alive_secs: Option<u64>,
    workers: Option<u64>,

    bind: String,

    payload_limit_mib: usize,
}

impl RestfulServer {
    pub fn new(bind: String, pipeline: Arc<Pipeline>, payload_limit_mib: usize) -> Self {
        Self {
            ssl: None,
            pipeline,
            keep_alive_secs: None,
            workers: None,
            bind,
            payload_limit_mib,
        }
    }

    pub fn set_ssl(&mut self, ssl: SslAcceptorBuilder) {
        self.ssl = Some(ssl);
    }

    pub fn set_keep_alive_secs(&mut self, keep_alive_secs: u64) {
        self.keep_alive_secs = Some(keep_alive_secs);
    }

    pub fn set_workers(&mut self, workers: u64) {
        self.workers = Some(workers);
    }

    pub async fn run(mut self) -> Result<()> {
        let pipeline = self.pipeline.clone();
        let payload_limit = self.payload_limit_mib * 1024 * 1024;
        let mut srv = HttpServer::new(move || {
            App::new()
                .app_data(Data::new(pipeline.clone()))
                .app_data(PayloadConfig::new(payload_limit))
                .default_service(web::route().to(Self::handle))
        });

        if let Some(ssl) = self.ssl.take() {
            info!("Binding to https://{}", self.bind);
            srv = srv.bind_openssl(&self.bind, ssl).context("bind with ssl")?
        } else {
            warn!("Using HTTP (without SSL). THIS IS DANGEROUS, DO NOT USE IN PRODUCTION");
            info!("Binding to http://{}", self.bind);
            srv = srv.bind(&self.bind).context("bind without ssl")?
        };

        if let Some(keep_alive) = self.keep_alive_secs {
            srv = srv.keep_alive(Duration::from_secs(keep_alive));
        }
        if let Some(workers) = self.workers {
            srv = srv.workers(workers as usize);
        }

        sd_notify::notify(true, &[NotifyState::Ready]).context("notify systemd")?;
        info!("Starting restful server");
        srv.run().await.context("run server")?;

        info!("Server stopped by user");
        Ok(())
    }

    /// Every route goes through the pipeline. Routing and method errors are
    /// answered before any event fires.
    async fn handle(
        req: HttpRequest,
        body: Option<Bytes>,
        pipeline: Data<Arc<Pipeline>>,
    ) -> HttpResponse {
        let req = match Request::from_http(&req, body) {
            Ok(req) => req,
            Err(resp) => return resp.into(),
        };

        // Listeners touch sqlite and locks, keep them off the async workers.
        let pipeline = pipeline.get_ref().clone();
        match web::block(move || pipeline.handle(req)).await {
            Ok(resp) => resp.into(),
            Err(err) => {
                error!("Pipeline task failed: {err:#}");
                HttpResponse::InternalServerError().finish()
            }
        }
    }
}
