use axum::Router;

use crate::api::dispatcher::{Dispatcher, RouteError};
use crate::api::handlers::{
    AppState, ContactCard, CreateContact, DeleteContact, GetContact, HealthCheck, ListContacts,
    UpdateContact,
};

pub fn create_dispatcher(state: AppState) -> Result<Dispatcher, RouteError> {
    Dispatcher::new()
        // Health check
        .route(HealthCheck::new(state.clone()))?
        // Contacts
        .route(ListContacts::new(state.clone()))?
        .route(CreateContact::new(state.clone()))?
        .route(GetContact::new(state.clone()))?
        .route(UpdateContact::new(state.clone()))?
        .route(DeleteContact::new(state.clone()))?
        .route(ContactCard::new(state))
}

pub fn create_router(state: AppState) -> Result<Router, RouteError> {
    Ok(create_dispatcher(state)?.into_router())
}
