/// Person registry endpoints
use crate::{
    api::{ApiJson, ApiResponse},
    auth::OptionalCaller,
    context::AppContext,
    error::{RegistryError, RegistryResult},
    registry::{DeleteOutcome, EditOutcome, ListQuery, Person, PersonChanges},
};
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Router,
};

/// Build person routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/persons", get(list_persons).post(create_person))
        .route(
            "/api/persons/:id",
            get(get_person).put(edit_person).delete(delete_person),
        )
        .route("/api/persons/:id/household", get(household))
}

fn parse_person_id(raw: &str) -> RegistryResult<i64> {
    raw.trim()
        .parse()
        .map_err(|_| RegistryError::Validation(format!("Invalid person id: {}", raw)))
}

/// Search by sabil number
async fn list_persons(
    State(ctx): State<AppContext>,
    caller: OptionalCaller,
    Query(query): Query<ListQuery>,
) -> RegistryResult<ApiResponse<Vec<Person>>> {
    let page = ctx.registry.list_by_location_code(caller.as_ref(), &query).await?;
    Ok(ApiResponse::paged(page))
}

async fn get_person(
    State(ctx): State<AppContext>,
    caller: OptionalCaller,
    Path(id): Path<String>,
) -> RegistryResult<ApiResponse<Person>> {
    let person = ctx
        .registry
        .get_person(caller.as_ref(), parse_person_id(&id)?)
        .await?;
    Ok(ApiResponse::ok(person))
}

async fn household(
    State(ctx): State<AppContext>,
    caller: OptionalCaller,
    Path(id): Path<String>,
) -> RegistryResult<ApiResponse<Vec<Person>>> {
    let members = ctx
        .registry
        .household_of(caller.as_ref(), parse_person_id(&id)?)
        .await?;
    Ok(ApiResponse::ok(members))
}

async fn create_person(
    State(ctx): State<AppContext>,
    caller: OptionalCaller,
    ApiJson(changes): ApiJson<PersonChanges>,
) -> RegistryResult<ApiResponse<Person>> {
    let person = ctx.registry.create_person(caller.as_ref(), changes).await?;
    Ok(ApiResponse::created(person).with_message("Record created successfully"))
}

/// Full edit for admins, household address confirmation for users
async fn edit_person(
    State(ctx): State<AppContext>,
    caller: OptionalCaller,
    Path(id): Path<String>,
    ApiJson(changes): ApiJson<PersonChanges>,
) -> RegistryResult<ApiResponse<EditOutcome>> {
    let outcome = ctx
        .registry
        .edit_person(caller.as_ref(), parse_person_id(&id)?, changes)
        .await?;
    let message = outcome.message.clone();
    Ok(ApiResponse::ok(outcome).with_message(message))
}

async fn delete_person(
    State(ctx): State<AppContext>,
    caller: OptionalCaller,
    Path(id): Path<String>,
) -> RegistryResult<ApiResponse<DeleteOutcome>> {
    let outcome = ctx
        .registry
        .soft_delete(caller.as_ref(), parse_person_id(&id)?)
        .await?;
    let message = if outcome.already_deleted {
        "Record was already deleted"
    } else {
        "Record deleted successfully"
    };
    Ok(ApiResponse::ok(outcome).with_message(message))
}
