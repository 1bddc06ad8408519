use reqwest::Method;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::sync::watch;

use crate::{
    auth::AuthHandle,
    error::ClientError,
    models::AuthorRecord,
    transport::{ApiRequest, TransportState},
};

/// Entity
///
/// A backend resource served under `ENDPOINT` (list/create) and
/// `ENDPOINT/{id}` (update/delete), identified by a server-assigned integer id.
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Collection path, e.g. `/author`.
    const ENDPOINT: &'static str;

    fn id(&self) -> Option<i64>;

    fn set_id(&mut self, id: i64);
}

/// The JSON body sent for `record`: every field except `id`.
pub fn payload_without_id<E: Entity>(record: &E) -> Result<Value, ClientError> {
    let mut value = serde_json::to_value(record)?;
    if let Some(object) = value.as_object_mut() {
        object.remove("id");
    }
    Ok(value)
}

/// EntityService
///
/// CRUD client for one entity type plus a local mirror of the server
/// collection. The mirror is only written after the backend confirms a
/// mutation, so every cached record matches the last acknowledged server state.
///
/// The collection is published through a `watch` channel: views call
/// `subscribe()` and re-render whenever a mutation lands. Concurrent
/// mutations apply in completion order with no conflict detection.
pub struct EntityService<E: Entity> {
    transport: TransportState,
    auth: AuthHandle,
    records: watch::Sender<Vec<E>>,
}

/// AuthorService
pub type AuthorService = EntityService<AuthorRecord>;

impl<E: Entity> EntityService<E> {
    pub fn new(transport: TransportState, auth: AuthHandle) -> Self {
        let (records, _) = watch::channel(Vec::new());
        Self {
            transport,
            auth,
            records,
        }
    }

    /// A copy of the cached collection.
    pub fn snapshot(&self) -> Vec<E> {
        self.records.borrow().clone()
    }

    /// Observe the collection; the receiver is notified after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<Vec<E>> {
        self.records.subscribe()
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    /// The cached record with `id`, if present.
    pub fn get(&self, id: i64) -> Option<E> {
        self.records
            .borrow()
            .iter()
            .find(|record| record.id() == Some(id))
            .cloned()
    }

    /// fetch_all
    ///
    /// Replaces the whole cached collection with the server's list and returns
    /// its length.
    ///
    /// # Errors
    /// On transport, rejection or decode failure the cache is kept as it was
    /// and the error is logged and returned.
    pub async fn fetch_all(&self) -> Result<usize, ClientError> {
        match self.try_fetch().await {
            Ok(records) => {
                let count = records.len();
                self.records.send_replace(records);
                tracing::debug!(endpoint = E::ENDPOINT, count, "collection refreshed");
                Ok(count)
            }
            Err(err) => {
                tracing::warn!(
                    endpoint = E::ENDPOINT,
                    error = %err,
                    "fetch failed, keeping cached collection"
                );
                Err(err)
            }
        }
    }

    async fn try_fetch(&self) -> Result<Vec<E>, ClientError> {
        let body = self.transport.send(ApiRequest::get(E::ENDPOINT)).await?;
        Ok(serde_json::from_value(body)?)
    }

    /// create
    ///
    /// Sends `record` without its id, then writes the server-assigned id back
    /// onto `record` and appends a copy to the cache.
    ///
    /// # Errors
    /// `ClientError::CreationFailed` wrapping the cause; the cache is unchanged.
    pub async fn create(&self, record: &mut E) -> Result<E, ClientError> {
        let id = self.try_create(record).await.map_err(|err| {
            tracing::warn!(endpoint = E::ENDPOINT, error = %err, "create failed");
            ClientError::creation(err)
        })?;

        record.set_id(id);
        let created = record.clone();
        self.records.send_modify(|records| records.push(created.clone()));
        tracing::debug!(endpoint = E::ENDPOINT, id, "record created");
        Ok(created)
    }

    async fn try_create(&self, record: &E) -> Result<i64, ClientError> {
        let token = self.bearer()?;
        let request = ApiRequest::new(Method::POST, E::ENDPOINT)
            .bearer(token)
            .json(payload_without_id(record)?);
        let response = self.transport.send(request).await?;
        response
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| ClientError::Transport("create response has no numeric id".to_string()))
    }

    /// update
    ///
    /// Sends a partial update for `record` and, once confirmed, replaces the
    /// cached record with the same id in place. A record that is not cached is
    /// not inserted.
    ///
    /// # Errors
    /// `ClientError::ContractViolation` if `record` has no id (nothing is sent);
    /// otherwise `ClientError::UpdateFailed` wrapping the cause.
    pub async fn update(&self, record: &E) -> Result<(), ClientError> {
        let id = record
            .id()
            .ok_or(ClientError::ContractViolation("update requires a record id"))?;

        self.try_update(id, record).await.map_err(|err| {
            tracing::warn!(endpoint = E::ENDPOINT, id, error = %err, "update failed");
            ClientError::update(err)
        })?;

        let applied = self.records.send_if_modified(|records| {
            match records.iter_mut().find(|cached| cached.id() == Some(id)) {
                Some(cached) => {
                    *cached = record.clone();
                    true
                }
                None => false,
            }
        });
        if !applied {
            tracing::debug!(endpoint = E::ENDPOINT, id, "updated record not cached, skipping");
        }
        Ok(())
    }

    async fn try_update(&self, id: i64, record: &E) -> Result<(), ClientError> {
        let token = self.bearer()?;
        let request = ApiRequest::new(Method::PATCH, format!("{}/{id}", E::ENDPOINT))
            .bearer(token)
            .json(payload_without_id(record)?);
        self.transport.send(request).await?;
        Ok(())
    }

    /// delete
    ///
    /// Deletes the record server-side, then drops every cached record with `id`.
    /// Deleting an id that is not cached leaves the cache unchanged.
    ///
    /// # Errors
    /// `ClientError::DeleteFailed` wrapping the cause.
    pub async fn delete(&self, id: i64) -> Result<(), ClientError> {
        self.try_delete(id).await.map_err(|err| {
            tracing::warn!(endpoint = E::ENDPOINT, id, error = %err, "delete failed");
            ClientError::delete(err)
        })?;

        self.records.send_if_modified(|records| {
            let before = records.len();
            records.retain(|cached| cached.id() != Some(id));
            records.len() != before
        });
        Ok(())
    }

    async fn try_delete(&self, id: i64) -> Result<(), ClientError> {
        let token = self.bearer()?;
        let request =
            ApiRequest::new(Method::DELETE, format!("{}/{id}", E::ENDPOINT)).bearer(token);
        self.transport.send(request).await?;
        Ok(())
    }

    /// can_manage
    ///
    /// Refreshes the shared role and reports whether it may manage this
    /// collection (admin or librarian). Every holder of the same `AuthHandle`
    /// observes the refreshed role afterwards.
    ///
    /// # Errors
    /// Propagates a failed role refresh.
    pub async fn can_manage(&self) -> Result<bool, ClientError> {
        let role = self.auth.refresh().await?;
        Ok(role.is_some_and(|role| role.can_manage()))
    }

    fn bearer(&self) -> Result<String, ClientError> {
        self.auth.token().ok_or(ClientError::Unauthenticated)
    }
}
