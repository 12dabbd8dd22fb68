//! The Executor - single entry point to the Tessera engine.
//!
//! The Executor is a stateless dispatcher: it checks the request size, parses
//! the command, routes it to the [`Engine`] and renders the result. All state
//! lives in the engine.

use std::sync::Arc;
use tracing::debug;

use tessera_core::NamespaceName;
use tessera_engine::{Engine, Error as EngineError};

use crate::command::{Command, Scope};
use crate::context::RequestContext;
use crate::output::{CommandResponse, Output};
use crate::providers::{RERANKING_PROVIDERS, VECTOR_PROVIDERS};
use crate::Result;

/// The command executor.
///
/// `Send + Sync`; share one instance across request threads.
///
/// # Example
///
/// ```ignore
/// use tessera_executor::{Executor, RequestContext};
///
/// let executor = Executor::new(engine);
/// let response = executor.execute_json(&ctx, r#"{"findNamespaces": {}}"#);
/// ```
#[derive(Debug, Clone)]
pub struct Executor {
    engine: Arc<Engine>,
}

impl Executor {
    /// Create an executor over an engine.
    pub fn new(engine: Arc<Engine>) -> Self {
        Executor { engine }
    }

    /// The engine commands run against.
    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Execute a raw request body and render the response envelope.
    ///
    /// The size limit is enforced before the body is parsed, so an oversized
    /// body is rejected whatever its shape.
    pub fn execute_json(&self, ctx: &RequestContext, body: &str) -> CommandResponse {
        if let Err(e) = self.engine.check_request_size(body.len()) {
            debug!(target: "tessera::executor", tenant = %ctx.tenant, size = body.len(), "request too large");
            return CommandResponse::from_error(&e.into());
        }
        let command = match Command::parse(body) {
            Ok(command) => command,
            Err(e) => {
                debug!(target: "tessera::executor", tenant = %ctx.tenant, code = e.code(), "request rejected");
                return CommandResponse::from_error(&e);
            }
        };
        match self.execute(ctx, command) {
            Ok(output) => output.into_response(),
            Err(e) => CommandResponse::from_error(&e),
        }
    }

    /// Execute a parsed command.
    pub fn execute(&self, ctx: &RequestContext, command: Command) -> Result<Output> {
        let name = command.name();
        match command.scope() {
            Scope::Tenant => {}
            Scope::Namespace => {
                ctx.namespace_for(name)?;
            }
            Scope::Collection => {
                ctx.collection_for(name)?;
            }
        }
        let result = self.dispatch(ctx, name, command);
        match &result {
            Ok(_) => debug!(target: "tessera::executor", tenant = %ctx.tenant, command = name, "ok"),
            Err(e) => debug!(target: "tessera::executor", tenant = %ctx.tenant, command = name, code = e.code(), error = %e, "failed"),
        }
        result
    }

    /// Execute commands in order, one result per command.
    pub fn execute_many(&self, ctx: &RequestContext, commands: Vec<Command>) -> Vec<Result<Output>> {
        commands
            .into_iter()
            .map(|command| self.execute(ctx, command))
            .collect()
    }

    fn dispatch(&self, ctx: &RequestContext, name: &'static str, command: Command) -> Result<Output> {
        let engine = &self.engine;
        let tenant = &ctx.tenant;
        let output = match command {
            // Tenant
            Command::CreateNamespace(request) => {
                let namespace = NamespaceName::new(request.name).map_err(EngineError::from)?;
                engine.create_namespace(tenant, &namespace)?;
                Output::Ok
            }
            Command::DropNamespace(request) => {
                let namespace = NamespaceName::new(request.name).map_err(EngineError::from)?;
                engine.drop_namespace(tenant, &namespace)?;
                Output::Ok
            }
            Command::FindNamespaces(_) => Output::Namespaces(engine.find_namespaces(tenant)?),
            Command::FindVectorProviders(_) => Output::Providers {
                key: "vectorProviders",
                providers: VECTOR_PROVIDERS.clone(),
            },
            Command::FindRerankingProviders(_) => Output::Providers {
                key: "rerankingProviders",
                providers: RERANKING_PROVIDERS.clone(),
            },

            // Namespace
            Command::CreateCollection(request) => {
                engine.create_collection(tenant, ctx.namespace_for(name)?, &request)?;
                Output::Ok
            }
            Command::DeleteCollection(request) => {
                engine.delete_collection(tenant, ctx.namespace_for(name)?, &request)?;
                Output::Ok
            }
            Command::FindCollections(request) => {
                Output::Collections(engine.find_collections(tenant, ctx.namespace_for(name)?, &request)?)
            }

            // Collection
            Command::InsertOne(request) => {
                Output::Inserted(engine.insert_one(&ctx.collection_for(name)?, &request)?)
            }
            Command::InsertMany(request) => {
                Output::Inserted(engine.insert_many(&ctx.collection_for(name)?, &request)?)
            }
            Command::Find(request) => Output::Documents(engine.find(&ctx.collection_for(name)?, &request)?),
            Command::FindOne(request) => Output::Document(engine.find_one(&ctx.collection_for(name)?, request)?),
            Command::CountDocuments(request) => {
                Output::Count(engine.count_documents(&ctx.collection_for(name)?, &request)?)
            }
            Command::UpdateOne(request) => {
                Output::Updated(engine.update_one(&ctx.collection_for(name)?, &request)?)
            }
            Command::DeleteOne(request) => {
                Output::Deleted(engine.delete_one(&ctx.collection_for(name)?, &request)?)
            }
            Command::DeleteMany(request) => {
                Output::Deleted(engine.delete_many(&ctx.collection_for(name)?, &request)?)
            }
        };
        Ok(output)
    }
}
