use actix_web::{get, post, web, HttpRequest, HttpResponse};
use serde::Serialize;

use crate::auth;
use crate::error::LedgerError;
use crate::service::{LedgerService, MonthlyTotal, NewExpense, NewGroup, NewSettlement};
use crate::money::Amount;

pub struct AppState {
    pub service: LedgerService,
    pub bot_token: String,
}

impl AppState {
    fn caller(&self, request: &HttpRequest) -> Result<String, LedgerError> {
        auth::caller(request, &self.bot_token)
    }
}

type Response = Result<HttpResponse, LedgerError>;

#[derive(Serialize)]
struct InviteToken {
    token: String,
}

#[derive(Serialize)]
struct JoinedGroup {
    group_id: String,
}

#[derive(Serialize)]
struct Spending {
    year: i32,
    total: Amount,
    monthly: Vec<MonthlyTotal>,
}

#[get("/balances")]
async fn get_balances(state: web::Data<AppState>, request: HttpRequest) -> Response {
    let user = state.caller(&request)?;
    Ok(HttpResponse::Ok().json(state.service.user_balances(&user).await?))
}

#[get("/groups")]
async fn get_groups(state: web::Data<AppState>, request: HttpRequest) -> Response {
    let user = state.caller(&request)?;
    Ok(HttpResponse::Ok().json(state.service.user_groups(&user).await?))
}

#[post("/groups")]
async fn add_group(
    state: web::Data<AppState>,
    request: HttpRequest,
    json: web::Json<NewGroup>,
) -> Response {
    let user = state.caller(&request)?;
    let group = state.service.create_group(&user, json.into_inner()).await?;
    Ok(HttpResponse::Created().json(group))
}

#[get("/groups/{id}/ledger")]
async fn get_group_ledger(
    state: web::Data<AppState>,
    request: HttpRequest,
    id: web::Path<String>,
) -> Response {
    let user = state.caller(&request)?;
    Ok(HttpResponse::Ok().json(state.service.group_ledger(&id, &user).await?))
}

#[get("/groups/{id}/members")]
async fn get_group_members(
    state: web::Data<AppState>,
    request: HttpRequest,
    id: web::Path<String>,
) -> Response {
    let user = state.caller(&request)?;
    let view = state.service.group_or_members(&user, Some(id.as_str())).await?;
    Ok(HttpResponse::Ok().json(view))
}

#[post("/groups/{id}/expenses")]
async fn add_group_expense(
    state: web::Data<AppState>,
    request: HttpRequest,
    id: web::Path<String>,
    expense: web::Json<NewExpense>,
) -> Response {
    let user = state.caller(&request)?;
    let mut expense = expense.into_inner();
    expense.group_id = Some(id.into_inner());
    Ok(HttpResponse::Created().json(state.service.add_expense(&user, expense).await?))
}

#[post("/expenses")]
async fn add_direct_expense(
    state: web::Data<AppState>,
    request: HttpRequest,
    expense: web::Json<NewExpense>,
) -> Response {
    let user = state.caller(&request)?;
    let mut expense = expense.into_inner();
    expense.group_id = None;
    Ok(HttpResponse::Created().json(state.service.add_expense(&user, expense).await?))
}

#[post("/groups/{id}/settlements")]
async fn add_group_settlement(
    state: web::Data<AppState>,
    request: HttpRequest,
    id: web::Path<String>,
    settlement: web::Json<NewSettlement>,
) -> Response {
    let user = state.caller(&request)?;
    let mut settlement = settlement.into_inner();
    settlement.group_id = Some(id.into_inner());
    Ok(HttpResponse::Created().json(state.service.add_settlement(&user, settlement).await?))
}

#[post("/settlements")]
async fn add_direct_settlement(
    state: web::Data<AppState>,
    request: HttpRequest,
    settlement: web::Json<NewSettlement>,
) -> Response {
    let user = state.caller(&request)?;
    let mut settlement = settlement.into_inner();
    settlement.group_id = None;
    Ok(HttpResponse::Created().json(state.service.add_settlement(&user, settlement).await?))
}

#[post("/groups/{id}/invite")]
async fn generate_invite(
    state: web::Data<AppState>,
    request: HttpRequest,
    id: web::Path<String>,
) -> Response {
    let user = state.caller(&request)?;
    let token = state.service.generate_invite_token(&id, &user).await?;
    Ok(HttpResponse::Ok().json(InviteToken { token }))
}

#[post("/join/{token}")]
async fn join_group(
    state: web::Data<AppState>,
    request: HttpRequest,
    token: web::Path<String>,
) -> Response {
    let user = state.caller(&request)?;
    let group_id = state.service.join_group_by_token(&token, &user).await?;
    Ok(HttpResponse::Ok().json(JoinedGroup { group_id }))
}

#[get("/people/{id}")]
async fn get_person(
    state: web::Data<AppState>,
    request: HttpRequest,
    id: web::Path<String>,
) -> Response {
    let user = state.caller(&request)?;
    Ok(HttpResponse::Ok().json(state.service.balance_between(&user, &id).await?))
}

#[get("/spending/{year}")]
async fn get_spending(
    state: web::Data<AppState>,
    request: HttpRequest,
    year: web::Path<i32>,
) -> Response {
    let user = state.caller(&request)?;
    let year = year.into_inner();
    let (total, monthly) = futures::try_join!(
        state.service.total_spent(&user, year),
        state.service.monthly_spending(&user, year),
    )?;
    Ok(HttpResponse::Ok().json(Spending {
        year,
        total,
        monthly,
    }))
}

#[get("/reminders/outstanding")]
async fn get_outstanding_debts(state: web::Data<AppState>, request: HttpRequest) -> Response {
    auth::require_bot(&request, &state.bot_token)?;
    Ok(HttpResponse::Ok().json(state.service.outstanding_debts().await?))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(get_balances)
        .service(get_groups)
        .service(add_group)
        .service(get_group_ledger)
        .service(get_group_members)
        .service(add_group_expense)
        .service(add_direct_expense)
        .service(add_group_settlement)
        .service(add_direct_settlement)
        .service(generate_invite)
        .service(join_group)
        .service(get_person)
        .service(get_spending)
        .service(get_outstanding_debts);
}
