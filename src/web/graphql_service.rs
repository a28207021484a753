use std::sync::Arc;

use actix_identity::Identity;
use actix_web::{Error, HttpResponse, web, HttpRequest, http::Uri, http::PathAndQuery};
use juniper::http::{graphiql::graphiql_source, GraphQLRequest};
use log::warn;

use crate::AppData;

use super::errors::ServiceError;
use super::graphql_schema::Context;

pub async fn graphql(
    ctx: web::Data<AppData>,
    identity: Identity,
    data: web::Json<GraphQLRequest>,
) -> Result<HttpResponse, Error> {
    let original_identity = identity.identity();
    let app: Arc<AppData> = ctx.into_inner();
    let cookie = original_identity.clone();

    let (body, new_identity) = web::block(move || {
        let session = match cookie.as_ref() {
            Some(x) => app.auth_cache.parse_identity(&app, x)?,
            None => None,
        };
        // Stale or tampered cookies are dropped
        let current_identity = if session.is_some() { cookie } else { None };

        let req_ctx = Context::new(app.clone(), current_identity, session);
        let res = data.execute(&app.graphql_schema, &req_ctx);
        let body = serde_json::to_string(&res)
            .map_err(|e| ServiceError::InternalServerError(e.to_string()))?;
        Ok::<_, ServiceError>((body, req_ctx.identity.into_inner()))
    }).await?;

    if new_identity != original_identity {
        match new_identity {
            None => {
                if original_identity.is_some() {
                    warn!("Forgetting invalid or logged out identity");
                }
                identity.forget()
            },
            Some(x) => identity.remember(x),
        }
    }

    Ok(HttpResponse::Ok()
        .content_type("application/json")
        .body(body))
}

pub async fn graphiql(request: HttpRequest) -> HttpResponse {
    let mut orig = request.uri().clone().into_parts();
    orig.path_and_query = Some(PathAndQuery::from_static("/api/graphql"));
    let html = match Uri::from_parts(orig) {
        Ok(uri) => graphiql_source(&uri.to_string()),
        Err(_) => graphiql_source("/api/graphql"),
    };
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(html)
}
