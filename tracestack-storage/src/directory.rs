// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Identity directories used to turn dictionary ids into display names
//!
//! These are caches owned by other parts of the backend; the query engine
//! only reads them.

use crate::error::StorageResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub application_id: i32,
    pub application_code: String,
}

#[async_trait]
pub trait AddressCache: Send + Sync {
    async fn address(&self, address_id: i32) -> StorageResult<Option<String>>;
}

#[async_trait]
pub trait ServiceNameCache: Send + Sync {
    async fn service_name(&self, service_id: i32) -> StorageResult<Option<String>>;
}

#[async_trait]
pub trait ApplicationCache: Send + Sync {
    async fn application(&self, application_id: i32) -> StorageResult<Option<Application>>;
}

/// Static catalog of instrumented component libraries
pub trait ComponentCatalog: Send + Sync {
    fn component_name(&self, component_id: i32) -> Option<String>;
}

#[async_trait]
impl<T: AddressCache + ?Sized> AddressCache for Arc<T> {
    async fn address(&self, address_id: i32) -> StorageResult<Option<String>> {
        (**self).address(address_id).await
    }
}

#[async_trait]
impl<T: ServiceNameCache + ?Sized> ServiceNameCache for Arc<T> {
    async fn service_name(&self, service_id: i32) -> StorageResult<Option<String>> {
        (**self).service_name(service_id).await
    }
}

#[async_trait]
impl<T: ApplicationCache + ?Sized> ApplicationCache for Arc<T> {
    async fn application(&self, application_id: i32) -> StorageResult<Option<Application>> {
        (**self).application(application_id).await
    }
}
