//! Downstream validator collaborator

use super::dispatch::Dispatcher;
use ingress_core::models::{ServiceDescriptor, StagedRequest};
use ingress_core::AppError;
use std::collections::HashSet;

pub trait Validator: Send + Sync {
    /// Check that the resolved service is currently accepted downstream.
    fn validate_service(&self, descriptor: &ServiceDescriptor) -> Result<(), AppError>;

    /// Hand a staged request over for asynchronous validation.
    fn validate(&self, request: StagedRequest);
}

pub struct DispatchValidator {
    valid_services: HashSet<String>,
    dispatcher: Dispatcher<StagedRequest>,
}

impl DispatchValidator {
    pub fn new(valid_services: HashSet<String>, dispatcher: Dispatcher<StagedRequest>) -> Self {
        Self {
            valid_services,
            dispatcher,
        }
    }
}

impl Validator for DispatchValidator {
    fn validate_service(&self, descriptor: &ServiceDescriptor) -> Result<(), AppError> {
        if self.valid_services.contains(&descriptor.service) {
            Ok(())
        } else {
            Err(AppError::UnrecognizedService(descriptor.service.clone()))
        }
    }

    fn validate(&self, request: StagedRequest) {
        tracing::debug!(
            request_id = %request.request_id(),
            service = %request.request.service,
            "Forwarding staged request for validation"
        );
        self.dispatcher.dispatch(request);
    }
}
