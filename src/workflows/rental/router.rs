use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde_json::json;

use super::domain::{ContractId, DocumentId, DocumentKind, DriverId, SignaturePayload, VehicleId};
use super::events::NotificationPublisher;
use super::export::statement_csv_string;
use super::repository::RentalStore;
use super::service::{
    ContractRequest, CoreError, NewDriver, NewVehicle, OperatorVehicleStatus, RentalService,
    VerificationDecision,
};
use super::verification::ReviewDecision;

type Service<S, N> = Arc<RentalService<S, N>>;

/// Router builder exposing the rental operations over HTTP.
pub fn rental_router<S, N>(service: Service<S, N>) -> Router
where
    S: RentalStore + 'static,
    N: NotificationPublisher + 'static,
{
    Router::new()
        .route("/api/v1/drivers", post(register_driver::<S, N>))
        .route(
            "/api/v1/drivers/:driver_id/documents",
            post(upload_document::<S, N>),
        )
        .route(
            "/api/v1/documents/:document_id/review",
            post(review_document::<S, N>),
        )
        .route(
            "/api/v1/drivers/:driver_id/verification",
            post(finalize_verification::<S, N>),
        )
        .route(
            "/api/v1/drivers/:driver_id/resubmission",
            post(resubmit_verification::<S, N>),
        )
        .route("/api/v1/vehicles", post(register_vehicle::<S, N>))
        .route(
            "/api/v1/vehicles/:vehicle_id/status",
            put(set_vehicle_status::<S, N>),
        )
        .route("/api/v1/contracts", post(create_contract::<S, N>))
        .route(
            "/api/v1/contracts/:contract_id/send",
            post(send_contract::<S, N>),
        )
        .route(
            "/api/v1/contracts/:contract_id/sign",
            post(driver_sign::<S, N>),
        )
        .route(
            "/api/v1/contracts/:contract_id/reject",
            post(reject_contract::<S, N>),
        )
        .route(
            "/api/v1/contracts/:contract_id/activate",
            post(activate_contract::<S, N>),
        )
        .route(
            "/api/v1/contracts/:contract_id/suspend",
            post(suspend_contract::<S, N>),
        )
        .route(
            "/api/v1/contracts/:contract_id/resume",
            post(resume_contract::<S, N>),
        )
        .route(
            "/api/v1/contracts/:contract_id/end",
            post(end_contract::<S, N>),
        )
        .route(
            "/api/v1/contracts/:contract_id",
            delete(delete_draft::<S, N>),
        )
        .route(
            "/api/v1/contracts/:contract_id/statement",
            get(contract_statement::<S, N>),
        )
        .route(
            "/api/v1/contracts/:contract_id/statement.csv",
            get(contract_statement_csv::<S, N>),
        )
        .route(
            "/api/v1/contracts/:contract_id/payments/pay",
            post(mark_payment_paid::<S, N>),
        )
        .route(
            "/api/v1/contracts/:contract_id/payments/fail",
            post(mark_payment_failed::<S, N>),
        )
        .route(
            "/api/v1/contracts/:contract_id/payments/extend",
            post(extend_horizon::<S, N>),
        )
        .route("/api/v1/billing/overdue-sweep", post(overdue_sweep::<S, N>))
        .route("/api/v1/billing/reminders", post(due_reminders::<S, N>))
        .with_state(service)
}

/// Stable error-kind to status-code mapping for every operation.
fn error_response(error: CoreError) -> Response {
    let status = match &error {
        CoreError::Validation(_) => StatusCode::BAD_REQUEST,
        CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        CoreError::InvalidTransition { .. } | CoreError::Conflict { .. } => StatusCode::CONFLICT,
        CoreError::Precondition(_) => StatusCode::UNPROCESSABLE_ENTITY,
        CoreError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({
        "kind": error.kind(),
        "error": error.to_string(),
    });
    (status, Json(payload)).into_response()
}

fn respond<T: serde::Serialize>(result: Result<T, CoreError>, created: bool) -> Response {
    match result {
        Ok(value) => {
            let status = if created {
                StatusCode::CREATED
            } else {
                StatusCode::OK
            };
            (status, Json(value)).into_response()
        }
        Err(error) => error_response(error),
    }
}

fn today_or_now(today: Option<NaiveDate>) -> NaiveDate {
    today.unwrap_or_else(|| Local::now().date_naive())
}

#[derive(Debug, Deserialize)]
struct UploadRequest {
    kind: DocumentKind,
    #[serde(default)]
    today: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct ReviewRequest {
    decision: ReviewDecision,
    #[serde(default)]
    note: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FinalizeRequest {
    decision: VerificationDecision,
    #[serde(default)]
    note: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VehicleStatusRequest {
    status: OperatorVehicleStatus,
}

#[derive(Debug, Deserialize)]
struct SignRequest {
    #[serde(flatten)]
    payload: SignaturePayload,
    #[serde(default)]
    today: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Default)]
struct ClockRequest {
    #[serde(default)]
    today: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct PaymentActionRequest {
    due_date: NaiveDate,
    #[serde(default)]
    today: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Default)]
struct StatementQuery {
    #[serde(default)]
    today: Option<NaiveDate>,
}

async fn register_driver<S: RentalStore + 'static, N: NotificationPublisher + 'static>(
    State(service): State<Service<S, N>>,
    Json(intake): Json<NewDriver>,
) -> Response {
    respond(service.register_driver(intake), true)
}

async fn upload_document<S: RentalStore + 'static, N: NotificationPublisher + 'static>(
    State(service): State<Service<S, N>>,
    Path(driver_id): Path<String>,
    Json(request): Json<UploadRequest>,
) -> Response {
    let today = today_or_now(request.today);
    respond(
        service.upload_document(&DriverId(driver_id), request.kind, today),
        true,
    )
}

async fn review_document<S: RentalStore + 'static, N: NotificationPublisher + 'static>(
    State(service): State<Service<S, N>>,
    Path(document_id): Path<String>,
    Json(request): Json<ReviewRequest>,
) -> Response {
    respond(
        service.review_document(&DocumentId(document_id), request.decision, request.note),
        false,
    )
}

async fn finalize_verification<S: RentalStore + 'static, N: NotificationPublisher + 'static>(
    State(service): State<Service<S, N>>,
    Path(driver_id): Path<String>,
    Json(request): Json<FinalizeRequest>,
) -> Response {
    respond(
        service.finalize_verification(&DriverId(driver_id), request.decision, request.note),
        false,
    )
}

async fn resubmit_verification<S: RentalStore + 'static, N: NotificationPublisher + 'static>(
    State(service): State<Service<S, N>>,
    Path(driver_id): Path<String>,
) -> Response {
    respond(service.resubmit_verification(&DriverId(driver_id)), false)
}

async fn register_vehicle<S: RentalStore + 'static, N: NotificationPublisher + 'static>(
    State(service): State<Service<S, N>>,
    Json(intake): Json<NewVehicle>,
) -> Response {
    respond(service.register_vehicle(intake), true)
}

async fn set_vehicle_status<S: RentalStore + 'static, N: NotificationPublisher + 'static>(
    State(service): State<Service<S, N>>,
    Path(vehicle_id): Path<String>,
    Json(request): Json<VehicleStatusRequest>,
) -> Response {
    respond(
        service.set_vehicle_status(&VehicleId(vehicle_id), request.status),
        false,
    )
}

async fn create_contract<S: RentalStore + 'static, N: NotificationPublisher + 'static>(
    State(service): State<Service<S, N>>,
    Json(request): Json<ContractRequest>,
) -> Response {
    respond(service.create_contract(request), true)
}

async fn send_contract<S: RentalStore + 'static, N: NotificationPublisher + 'static>(
    State(service): State<Service<S, N>>,
    Path(contract_id): Path<String>,
) -> Response {
    respond(service.send_contract(&ContractId(contract_id)), false)
}

async fn driver_sign<S: RentalStore + 'static, N: NotificationPublisher + 'static>(
    State(service): State<Service<S, N>>,
    Path(contract_id): Path<String>,
    Json(request): Json<SignRequest>,
) -> Response {
    let today = today_or_now(request.today);
    respond(
        service.driver_sign(&ContractId(contract_id), &request.payload, today),
        false,
    )
}

async fn reject_contract<S: RentalStore + 'static, N: NotificationPublisher + 'static>(
    State(service): State<Service<S, N>>,
    Path(contract_id): Path<String>,
) -> Response {
    respond(service.reject_contract(&ContractId(contract_id)), false)
}

async fn activate_contract<S: RentalStore + 'static, N: NotificationPublisher + 'static>(
    State(service): State<Service<S, N>>,
    Path(contract_id): Path<String>,
) -> Response {
    respond(service.activate_contract(&ContractId(contract_id)), false)
}

async fn suspend_contract<S: RentalStore + 'static, N: NotificationPublisher + 'static>(
    State(service): State<Service<S, N>>,
    Path(contract_id): Path<String>,
) -> Response {
    respond(service.suspend_contract(&ContractId(contract_id)), false)
}

async fn resume_contract<S: RentalStore + 'static, N: NotificationPublisher + 'static>(
    State(service): State<Service<S, N>>,
    Path(contract_id): Path<String>,
) -> Response {
    respond(service.resume_contract(&ContractId(contract_id)), false)
}

async fn end_contract<S: RentalStore + 'static, N: NotificationPublisher + 'static>(
    State(service): State<Service<S, N>>,
    Path(contract_id): Path<String>,
    Json(request): Json<ClockRequest>,
) -> Response {
    let today = today_or_now(request.today);
    respond(service.end_contract(&ContractId(contract_id), today), false)
}

async fn delete_draft<S: RentalStore + 'static, N: NotificationPublisher + 'static>(
    State(service): State<Service<S, N>>,
    Path(contract_id): Path<String>,
) -> Response {
    match service.delete_draft_contract(&ContractId(contract_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

async fn contract_statement<S: RentalStore + 'static, N: NotificationPublisher + 'static>(
    State(service): State<Service<S, N>>,
    Path(contract_id): Path<String>,
    Query(query): Query<StatementQuery>,
) -> Response {
    let today = today_or_now(query.today);
    respond(
        service.contract_statement(&ContractId(contract_id), today),
        false,
    )
}

async fn contract_statement_csv<S: RentalStore + 'static, N: NotificationPublisher + 'static>(
    State(service): State<Service<S, N>>,
    Path(contract_id): Path<String>,
    Query(query): Query<StatementQuery>,
) -> Response {
    let today = today_or_now(query.today);
    match service.contract_statement(&ContractId(contract_id), today) {
        Ok(statement) => match statement_csv_string(&statement) {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/csv")],
                body,
            )
                .into_response(),
            Err(error) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": error.to_string() })),
            )
                .into_response(),
        },
        Err(error) => error_response(error),
    }
}

async fn mark_payment_paid<S: RentalStore + 'static, N: NotificationPublisher + 'static>(
    State(service): State<Service<S, N>>,
    Path(contract_id): Path<String>,
    Json(request): Json<PaymentActionRequest>,
) -> Response {
    let today = today_or_now(request.today);
    respond(
        service.mark_payment_paid(&ContractId(contract_id), request.due_date, today),
        false,
    )
}

async fn mark_payment_failed<S: RentalStore + 'static, N: NotificationPublisher + 'static>(
    State(service): State<Service<S, N>>,
    Path(contract_id): Path<String>,
    Json(request): Json<PaymentActionRequest>,
) -> Response {
    respond(
        service.mark_payment_failed(&ContractId(contract_id), request.due_date),
        false,
    )
}

async fn extend_horizon<S: RentalStore + 'static, N: NotificationPublisher + 'static>(
    State(service): State<Service<S, N>>,
    Path(contract_id): Path<String>,
) -> Response {
    match service.extend_payment_horizon(&ContractId(contract_id)) {
        Ok(inserted) => (StatusCode::OK, Json(json!({ "inserted": inserted }))).into_response(),
        Err(error) => error_response(error),
    }
}

async fn overdue_sweep<S: RentalStore + 'static, N: NotificationPublisher + 'static>(
    State(service): State<Service<S, N>>,
    Json(request): Json<ClockRequest>,
) -> Response {
    let today = today_or_now(request.today);
    respond(service.persist_overdue(today), false)
}

async fn due_reminders<S: RentalStore + 'static, N: NotificationPublisher + 'static>(
    State(service): State<Service<S, N>>,
    Json(request): Json<ClockRequest>,
) -> Response {
    let today = today_or_now(request.today);
    respond(service.dispatch_due_reminders(today), false)
}
