use std::io;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use log::{error, info, warn};

use signup::config::Settings;
use signup::events::WindowEventPublisher;
use signup::keeper::{ConnectionKeeper, PgConnector};
use signup::mailer::{DisabledMailer, Mailer, SmtpMailer};
use signup::routes;
use signup::store::RegistrationStore;

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let settings = Settings::from_env().map_err(|e| {
        error!("invalid configuration: {}", e);
        io::Error::new(io::ErrorKind::InvalidInput, e.to_string())
    })?;
    info!("signup schedule: {:?}", settings.schedule);

    let (keeper, mut fatal) = ConnectionKeeper::start(
        PgConnector::new(settings.database_url.clone()),
        settings.db_retry_delay,
    );
    info!("waiting for the database before accepting traffic");
    keeper.wait_connected().await;

    let mailer: Arc<dyn Mailer> = match &settings.mail {
        Some(mail) => match SmtpMailer::new(mail) {
            Ok(smtp) => Arc::new(smtp),
            Err(e) => {
                warn!("mail relay unusable, confirmations disabled: {}", e);
                Arc::new(DisabledMailer)
            }
        },
        None => {
            warn!("MAIL_SERVER not set, confirmations disabled");
            Arc::new(DisabledMailer)
        }
    };

    let store = web::Data::new(RegistrationStore::new(Arc::new(keeper), mailer));
    let schedule = web::Data::new(settings.schedule);
    let publisher = web::Data::new(WindowEventPublisher::new(settings.schedule));
    let admin = web::Data::new(settings.admin.clone());
    let static_dir = settings.static_dir.clone();

    info!("starting HTTP server at http://{}:{}", settings.bind_addr, settings.port);

    let server = HttpServer::new(move || {
        let mut app = App::new()
            .app_data(store.clone())
            .app_data(schedule.clone())
            .app_data(publisher.clone())
            .app_data(admin.clone())
            .wrap(Cors::permissive())
            .wrap(middleware::Logger::default())
            .configure(routes::configure);
        if let Some(dir) = &static_dir {
            app = app.service(actix_files::Files::new("/", dir).index_file("index.html"));
        }
        app
    })
    .bind((settings.bind_addr.as_str(), settings.port))?
    .run();
    let handle = server.handle();

    tokio::select! {
        result = server => result,
        Some(err) = fatal.recv() => {
            error!("fatal database error, shutting down: {}", err);
            handle.stop(false).await;
            Err(io::Error::new(io::ErrorKind::Other, err.to_string()))
        }
    }
}
