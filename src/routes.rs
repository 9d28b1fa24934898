use actix_web::http::header::{CACHE_CONTROL, RETRY_AFTER};
use actix_web::{error, get, post, web, HttpResponse};
use actix_web_httpauth::extractors::basic::BasicAuth;
use chrono::Utc;
use log::{info, warn};

use crate::auth::AdminAuth;
use crate::events::{self, WindowEventPublisher, KEEP_ALIVE_INTERVAL};
use crate::keeper::DEFAULT_RETRY_DELAY;
use crate::models::{Res, SpotsResponse, MAX_SPOTS};
use crate::schedule::{self, Category, WindowSchedule};
use crate::store::{RegistrationStore, StoreError};
use crate::validation::{SignupForm, ValidationErrors};

fn store_error_response(err: StoreError) -> HttpResponse {
    match err {
        StoreError::Unavailable => HttpResponse::ServiceUnavailable()
            .insert_header((RETRY_AFTER, DEFAULT_RETRY_DELAY.as_secs().to_string()))
            .finish(),
        StoreError::Persistence(_) => HttpResponse::InternalServerError().finish(),
    }
}

#[post("/signup")]
async fn signup(
    store: web::Data<RegistrationStore>,
    schedule: web::Data<WindowSchedule>,
    admin: web::Data<AdminAuth>,
    credentials: Option<BasicAuth>,
    form: web::Json<SignupForm>,
) -> HttpResponse {
    let mut submission = match form.validate() {
        Ok(submission) => submission,
        Err(errors) => {
            warn!("validation error on signup: {:?}", errors);
            return HttpResponse::UnprocessableEntity().json(ValidationErrors { errors });
        }
    };

    // Only board credentials may register someone as invited.
    if submission.participant.invited && !admin.permits(credentials.as_ref()) {
        info!("dropping invited flag from unauthenticated signup");
        submission.participant.invited = false;
    }

    let category = Category::of_submission(submission.participant.invited);
    if !schedule::is_open(&schedule, category, Utc::now()) {
        return HttpResponse::MethodNotAllowed().finish();
    }

    match store.create(submission).await {
        Ok(participant) => HttpResponse::Created().json(participant),
        Err(e) => store_error_response(e),
    }
}

#[get("/spots")]
async fn spots(store: web::Data<RegistrationStore>) -> HttpResponse {
    match store.count().await {
        Ok(used_spots) => HttpResponse::Ok().json(SpotsResponse {
            max_spots: MAX_SPOTS,
            used_spots,
        }),
        Err(e) => store_error_response(e),
    }
}

#[get("/participants")]
async fn participants(store: web::Data<RegistrationStore>) -> HttpResponse {
    match store.list().await {
        Ok(rows) => HttpResponse::Ok().json(rows),
        Err(e) => store_error_response(e),
    }
}

#[get("/all")]
async fn all_participants(
    store: web::Data<RegistrationStore>,
    admin: web::Data<AdminAuth>,
    credentials: Option<BasicAuth>,
) -> HttpResponse {
    if !admin.permits(credentials.as_ref()) {
        warn!("rejected unauthorized request for the participant dump");
        return AdminAuth::challenge();
    }

    match store.dump_all().await {
        Ok(rows) => HttpResponse::Ok().json(rows),
        Err(e) => store_error_response(e),
    }
}

#[get("/signup/enable")]
async fn signup_enable(publisher: web::Data<WindowEventPublisher>) -> HttpResponse {
    let subscription = publisher.subscribe();
    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header((CACHE_CONTROL, "no-cache"))
        .streaming(events::sse_stream(subscription, KEEP_ALIVE_INTERVAL))
}

pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let detail = err.to_string();
        let response = match err {
            error::JsonPayloadError::ContentType => {
                HttpResponse::UnsupportedMediaType().body("Unsupported Media Type")
            }
            error::JsonPayloadError::Deserialize(ref err) => {
                HttpResponse::BadRequest().json(Res { message: err.to_string() })
            }
            _ => HttpResponse::BadRequest().json(Res { message: detail }),
        };
        error::InternalError::from_response(err, response).into()
    })
}

/// Registers every endpoint. Expects `RegistrationStore`, `WindowSchedule`,
/// `WindowEventPublisher` and `AdminAuth` as app data.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .service(signup)
        .service(signup_enable)
        .service(spots)
        .service(participants)
        .service(all_participants);
}
