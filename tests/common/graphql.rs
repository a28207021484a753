use std::collections::HashMap;
use std::sync::Arc;

use juniper::http::GraphQLRequest;
use juniper::{DefaultScalarValue, InputValue};
use rand::Rng;
use serde::Deserialize;
use serde_json::json;
use serde_json::Value;

use stallingen_server::AppData;
use stallingen_server::config::Config;
use stallingen_server::web::graphql_schema::Context;

pub const ROOT_PASSWORD: &str = "password";

#[derive(Deserialize, Debug)]
#[allow(dead_code)]
pub struct ExecutionError {
    pub locations: Option<Value>,
    pub path: Option<Value>,
    pub message: String,
    pub extensions: Option<HashMap<String, String>>,
}

#[derive(Deserialize)]
pub struct GraphQLResult {
    pub data: Option<Value>,
    pub errors: Option<Vec<ExecutionError>>,
}

pub trait ExecutionErrorContainer {
    fn expect_service_error(&self, error_type: &str);
}

impl<T> ExecutionErrorContainer for Result<T, Vec<ExecutionError>> {
    fn expect_service_error(&self, error_type: &str) {
        let errors = self.as_ref().err().expect("Expected errored result");

        if !errors.iter().any(|x| {
            x.extensions.as_ref().map(|x| x.get("type").map(|t| t == error_type).unwrap_or(false)).unwrap_or(false)
        }) {
            panic!("Cannot find error: {} in {:?}", error_type, errors)
        }
    }
}

pub struct GraphQlQueryBuilder {
    query: String,
    variables: HashMap<String, Value>,
    operation_name: Option<String>,
}

impl GraphQlQueryBuilder {
    pub fn query<S: Into<String>>(query: S) -> GraphQlQueryBuilder {
        GraphQlQueryBuilder {
            query: query.into(),
            variables: HashMap::new(),
            operation_name: None
        }
    }

    pub fn add_variable<S: Into<String>, V: Into<Value>>(mut self, name: S, value: V) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }
}

pub fn query<S: Into<String>>(query: S) -> GraphQlQueryBuilder {
    GraphQlQueryBuilder::query(query)
}

impl From<GraphQlQueryBuilder> for GraphQLRequest<DefaultScalarValue> {
    fn from(builder: GraphQlQueryBuilder) -> Self {
        let variables: InputValue = serde_json::from_value(json!(builder.variables)).unwrap();
        GraphQLRequest::new(builder.query, builder.operation_name, Some(variables))
    }
}

fn json_object_extract_first(val: &Value) -> Option<Value> {
    val.as_object().and_then(|x| x.values().next()).cloned()
}

pub fn create_random_username() -> String {
    let data = rand::thread_rng().gen::<[u8; 16]>();
    hex::encode(&data)
}

/// Runs queries against the schema the way the HTTP handler does, keeping the
/// identity cookie value between requests.
#[derive(Clone)]
pub struct GraphQlTester {
    pub data: Arc<AppData>,
    pub identity: Option<String>,
}

impl GraphQlTester {
    pub fn submit_raw<R: Into<GraphQLRequest>>(&mut self, query: R) -> Result<Value, Vec<ExecutionError>> {
        let request: GraphQLRequest = query.into();

        let session = match self.identity.as_ref() {
            Some(x) => self.data.auth_cache.parse_identity(&self.data, x).unwrap(),
            None => None,
        };
        let identity = if session.is_some() { self.identity.clone() } else { None };

        let ctx = Context::new(self.data.clone(), identity, session);
        let response = request.execute(&self.data.graphql_schema, &ctx);
        self.identity = ctx.identity.into_inner();

        let result: GraphQLResult = serde_json::from_value(serde_json::to_value(&response).unwrap()).unwrap();
        match result.errors {
            Some(errors) if !errors.is_empty() => Err(errors),
            _ => Ok(result.data.unwrap_or(Value::Null)),
        }
    }

    pub fn submit<R: Into<GraphQLRequest>>(&mut self, query: R) -> Value {
        match self.submit_raw(query) {
            Ok(val) => json_object_extract_first(&val).expect("Cannot parse value"),
            Err(errors) => Self::manage_errors(errors),
        }
    }

    fn manage_errors(errors: Vec<ExecutionError>) -> ! {
        let errors = errors.iter()
            .map(|x| x.message.clone())
            .collect::<Vec<String>>()
            .join("\n");
        panic!("{}", errors)
    }

    pub fn login(&mut self, user_name: &str, password: &str) {
        self.submit(
            query(r#"mutation login($auth: AuthInput!) { login(auth: $auth) { id } }"#)
                .add_variable("auth", json!({
                    "userName": user_name,
                    "password": password
                }))
        );
    }

    pub fn login_root(&mut self) {
        self.login("root", ROOT_PASSWORD);
    }

    pub fn logout(&mut self) {
        self.submit(query(r#"mutation { logout }"#));
    }

    pub fn create_random_user(&mut self, password: &str, role: &str, own_contact_id: i64) -> (String, String) {
        let mut last_execution_error: Option<Vec<ExecutionError>> = None;
        for _ in 0..10 {
            let user_name = create_random_username();
            let res = self.submit_raw(query(r#"mutation addUser($data: UserInput!) {
                addUser(data: $data) { id }
            }"#).add_variable("data", json!({
                "userName": &user_name,
                "password": password,
                "role": role,
                "ownContactId": own_contact_id,
            })));

            match res {
                Ok(x) => {
                    let id = json_object_extract_first(&x).unwrap()["id"].as_str().unwrap().to_string();
                    return (id, user_name)
                },
                Err(errs) => last_execution_error = Some(errs),
            }
        }
        panic!("Error creating user, tried 10 times, {:?}", last_execution_error);
    }
}

/// Connects to the database named by `TEST_DATABASE_URL`, which must hold the
/// tables of `sql/schema.sql`.
pub fn init_app() -> GraphQlTester {
    dotenv::dotenv().ok();
    let database_url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");

    let mut vars = HashMap::new();
    vars.insert("DATABASE_URL", database_url);
    vars.insert("COOKIE_SECRET_KEY", "a".repeat(32));
    vars.insert("PASSWORD_SECRET_KEY", "a".repeat(32));
    vars.insert("ROOT_DEFAULT_PASSWORD", ROOT_PASSWORD.to_string());
    let config = Config::from_lookup(|key| vars.get(key).cloned()).unwrap();

    let data = AppData::new(&config).unwrap();
    data.setup_root_password(ROOT_PASSWORD.to_string(), true).unwrap();

    GraphQlTester {
        data: Arc::new(data),
        identity: None,
    }
}
