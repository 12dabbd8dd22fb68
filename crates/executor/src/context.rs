//! Request context.

use tessera_core::{CollectionName, NamespaceName, TenantId};
use tessera_engine::CollectionRef;

use crate::{Error, Result};

/// Who a command runs for and where.
///
/// The transport layer fills this in from the request path and credentials;
/// the body only names the command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Tenant database
    pub tenant: TenantId,
    /// Namespace, for namespace and collection commands
    pub namespace: Option<NamespaceName>,
    /// Collection, for collection commands
    pub collection: Option<CollectionName>,
}

impl RequestContext {
    /// Tenant-level context.
    pub fn new(tenant: TenantId) -> Self {
        RequestContext {
            tenant,
            namespace: None,
            collection: None,
        }
    }

    /// Set the namespace.
    pub fn with_namespace(mut self, namespace: NamespaceName) -> Self {
        self.namespace = Some(namespace);
        self
    }

    /// Set the collection.
    pub fn with_collection(mut self, collection: CollectionName) -> Self {
        self.collection = Some(collection);
        self
    }

    pub(crate) fn namespace_for(&self, command: &'static str) -> Result<&NamespaceName> {
        self.namespace.as_ref().ok_or(Error::MissingScope {
            command,
            scope: "namespace",
        })
    }

    pub(crate) fn collection_for(&self, command: &'static str) -> Result<CollectionRef> {
        let namespace = self.namespace_for(command)?;
        let collection = self.collection.as_ref().ok_or(Error::MissingScope {
            command,
            scope: "collection",
        })?;
        Ok(CollectionRef::new(
            self.tenant.clone(),
            namespace.clone(),
            collection.clone(),
        ))
    }
}
