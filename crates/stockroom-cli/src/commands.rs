//! Command handlers.

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};

use stockroom_core::{
    ApiError, AuthStatus, ConsoleContext, PageRequest, PaginatedResult, Resource, ResourceClient,
    ResourceId, ResourceKind,
};

use crate::Command;

/// Failures are either API outcomes, shown to the user as a notice, or
/// local problems reported as plain errors.
pub(crate) enum CommandError {
    Api(ApiError),
    Other(anyhow::Error),
}

impl From<ApiError> for CommandError {
    fn from(e: ApiError) -> Self {
        CommandError::Api(e)
    }
}

impl From<anyhow::Error> for CommandError {
    fn from(e: anyhow::Error) -> Self {
        CommandError::Other(e)
    }
}

/// One operation against a single collection, with raw user input.
enum Action {
    List { page: i64, size: Option<i64> },
    Get { id: String },
    Create { body: Value },
    Patch { id: String, body: Value },
    Replace { id: String, body: Value },
    Delete { id: String },
}

impl Action {
    fn is_write(&self) -> bool {
        !matches!(self, Action::List { .. } | Action::Get { .. })
    }
}

pub(crate) async fn run(context: &ConsoleContext, command: Command) -> Result<Option<String>, CommandError> {
    let (kind, action) = match command {
        Command::Login { token } => return login(context, token).map(Some),
        Command::Logout => {
            context
                .gate()
                .sign_out()
                .map_err(|e| anyhow::anyhow!("Failed to clear token: {}", e))?;
            return Ok(Some("Signed out.".to_string()));
        }
        Command::Whoami => return Ok(Some(whoami(context))),
        Command::Summary => return Ok(Some(pretty(&summary(context).await)?)),
        Command::List { resource, page, size } => (resource, Action::List { page, size }),
        Command::Get { resource, id } => (resource, Action::Get { id }),
        Command::Create { resource, json } => (resource, Action::Create { body: parse_json(&json)? }),
        Command::Patch { resource, id, json } => (
            resource,
            Action::Patch {
                id,
                body: parse_json(&json)?,
            },
        ),
        Command::Replace { resource, id, json } => (
            resource,
            Action::Replace {
                id,
                body: parse_json(&json)?,
            },
        ),
        Command::Delete { resource, id } => (resource, Action::Delete { id }),
    };

    if action.is_write() {
        check_write_access(context)?;
    }

    let output = match kind {
        ResourceKind::Categories => run_on(context, context.categories(), action).await?,
        ResourceKind::Products => run_on(context, context.products(), action).await?,
        ResourceKind::Suppliers => run_on(context, context.suppliers(), action).await?,
        ResourceKind::Warehouses => run_on(context, context.warehouses(), action).await?,
        ResourceKind::Inventories => run_on(context, context.inventories(), action).await?,
    };

    match output {
        Some(value) => Ok(Some(pretty(&value)?)),
        None => Ok(None),
    }
}

async fn run_on<T: Resource>(
    context: &ConsoleContext,
    client: &ResourceClient<T>,
    action: Action,
) -> Result<Option<Value>, CommandError> {
    let kind = client.kind();
    match action {
        Action::List { page, size } => {
            let size = size.unwrap_or(i64::from(context.config().default_page_size));
            let request = PageRequest::new(page, size).map_err(|e| ApiError::Validation(e.to_string()))?;
            let result = client.fetch_list(request).await?;
            let d = result.descriptor();
            eprintln!(
                "{} page {} of {} ({} total)",
                kind, d.page_number, d.total_pages, result.total_count
            );
            Ok(Some(to_json(&result)?))
        }
        Action::Get { id } => {
            let item = client.fetch_one(parse_id(kind, &id)?).await?;
            Ok(Some(to_json(&item)?))
        }
        Action::Create { body } => {
            let created = client.create(body).await?;
            Ok(created.map(|c| to_json(&c)).transpose()?)
        }
        Action::Patch { id, body } => {
            let patched = client.patch(parse_id(kind, &id)?, body).await?;
            Ok(patched.map(|p| to_json(&p)).transpose()?)
        }
        Action::Replace { id, body } => {
            let entity: T = serde_json::from_value(body)
                .map_err(|e| ApiError::Validation(format!("Not a complete {}: {}", kind, e)))?;
            let replaced = client.replace(parse_id(kind, &id)?, &entity).await?;
            Ok(replaced.map(|r| to_json(&r)).transpose()?)
        }
        Action::Delete { id } => {
            let id = parse_id(kind, &id)?;
            client.delete(id.clone()).await?;
            eprintln!("Deleted {}/{}", kind, id);
            Ok(None)
        }
    }
}

fn login(context: &ConsoleContext, token: Option<String>) -> Result<String, CommandError> {
    let token = match token {
        Some(token) => token,
        None => rpassword::prompt_password("Bearer token: ")
            .map_err(|e| anyhow::anyhow!("Failed to read token: {}", e))?,
    };

    let claims = context
        .gate()
        .sign_in(&token, Utc::now())
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    Ok(format!(
        "Signed in as {} ({})",
        claims.subject.as_deref().unwrap_or("unknown user"),
        claims.role.as_deref().unwrap_or("no role")
    ))
}

fn whoami(context: &ConsoleContext) -> String {
    let now = Utc::now();
    match context.gate().status(now) {
        AuthStatus::SignedIn(claims) => {
            let expires = claims
                .expiry
                .map(|e| e.to_rfc3339())
                .unwrap_or_else(|| "never".to_string());
            format!(
                "{} ({}), token expires {}{}",
                claims.subject.as_deref().unwrap_or("unknown user"),
                claims.role.as_deref().unwrap_or("no role"),
                expires,
                if context.gate().can_write(now) { ", can edit" } else { ", read only" }
            )
        }
        AuthStatus::SignedOut => "Not signed in.".to_string(),
    }
}

/// Write controls are advisory; the server makes the final decision.
fn check_write_access(context: &ConsoleContext) -> Result<(), ApiError> {
    let now = Utc::now();
    if context.gate().can_write(now) {
        return Ok(());
    }
    if context.gate().status(now).is_signed_in() {
        Err(ApiError::Forbidden("role cannot modify data".to_string()))
    } else {
        Err(ApiError::Unauthorized)
    }
}

/// First page of every collection, fetched concurrently.
async fn summary(context: &ConsoleContext) -> Value {
    let page = context.config().first_page();
    let (categories, products, suppliers, warehouses, inventories) = futures::join!(
        context.categories().fetch_list(page),
        context.products().fetch_list(page),
        context.suppliers().fetch_list(page),
        context.warehouses().fetch_list(page),
        context.inventories().fetch_list(page),
    );

    json!({
        "categories": totals(context, categories),
        "products": totals(context, products),
        "suppliers": totals(context, suppliers),
        "warehouses": totals(context, warehouses),
        "inventories": totals(context, inventories),
    })
}

fn totals<T>(context: &ConsoleContext, result: Result<PaginatedResult<T>, ApiError>) -> Value {
    match result {
        Ok(page) => {
            let d = page.descriptor();
            json!({ "totalCount": page.total_count, "totalPages": d.total_pages })
        }
        Err(e) => json!({ "error": context.notice_for(&e).to_string() }),
    }
}

fn parse_id(kind: ResourceKind, raw: &str) -> Result<ResourceId, ApiError> {
    ResourceId::parse(kind, raw).map_err(|e| ApiError::Validation(e.to_string()))
}

fn parse_json(raw: &str) -> Result<Value, CommandError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| ApiError::Validation(format!("Body is not valid JSON: {}", e)))?;
    if !value.is_object() {
        return Err(ApiError::Validation("Body must be a JSON object".to_string()).into());
    }
    Ok(value)
}

fn to_json<S: Serialize>(value: &S) -> Result<Value, CommandError> {
    serde_json::to_value(value)
        .map_err(|e| CommandError::Other(anyhow::anyhow!("Failed to encode output: {}", e)))
}

fn pretty(value: &Value) -> Result<String, CommandError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| CommandError::Other(anyhow::anyhow!("Failed to format output: {}", e)))
}
