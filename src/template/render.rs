//! Request-scoped template execution.
//!
//! Every [`TemplateSet`] has the helpers `csrf_field()`, `current_user()` and
//! `errors()` registered at parse time. The helpers themselves hold no state:
//! they read a binding table installed on the current thread for exactly the
//! duration of one synchronous render.
//!
//! ```text
//! ┌─────────────┐  bind   ┌────────────────┐  read  ┌──────────────────┐
//! │ render(ctx) │ ──────► │ thread binding │ ◄───── │ csrf_field() ... │
//! └─────────────┘         └────────────────┘        └──────────────────┘
//!        │ drop guard restores the previous binding (also on panic)
//!        ▼
//!   String buffer ──► 200 text/html  |  500 plain text
//! ```
//!
//! Because the set is never touched, concurrent renders of one set cannot
//! observe each other's principal or token.

use std::cell::RefCell;
use std::collections::HashMap;
use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use serde::Serialize;
use tera::{Context, Tera, Value};
use tracing::error;

use super::html_escape;
use super::store::TemplateSet;
use crate::error::{PublicMessage, TemplateError, GENERIC_ERROR_MESSAGE};
use crate::model::Principal;

/// Body returned when a template fails to execute.
pub const TEMPLATE_FAILURE_MESSAGE: &str = "There was an error executing the template";

// =============================================================================
// Render Context
// =============================================================================

/// Request-scoped state exposed to templates.
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    principal: Option<Principal>,
    csrf_token: String,
}

impl RenderContext {
    pub fn new(principal: Option<Principal>, csrf_token: impl Into<String>) -> Self {
        Self {
            principal,
            csrf_token: csrf_token.into(),
        }
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn csrf_token(&self) -> &str {
        &self.csrf_token
    }
}

// =============================================================================
// Helper Bindings
// =============================================================================

/// Values the helpers return during one render.
struct HelperBindings {
    csrf_field: Value,
    current_user: Value,
    errors: Value,
}

impl HelperBindings {
    fn new(ctx: &RenderContext, errors: &[&dyn PublicMessage]) -> Self {
        let csrf_field = format!(
            r#"<input type="hidden" name="csrf_token" value="{}">"#,
            html_escape(ctx.csrf_token())
        );
        let current_user = match ctx.principal() {
            Some(principal) => serde_json::json!({
                "id": principal.id,
                "email": principal.email,
            }),
            None => Value::Null,
        };
        let errors = errors
            .iter()
            .map(|err| {
                err.public_message()
                    .unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string())
            })
            .collect::<Vec<_>>();

        Self {
            csrf_field: Value::String(csrf_field),
            current_user,
            errors: Value::from(errors),
        }
    }
}

thread_local! {
    static BINDINGS: RefCell<Option<HelperBindings>> = const { RefCell::new(None) };
}

/// Installs bindings on the current thread until dropped.
struct BindingScope {
    previous: Option<HelperBindings>,
}

impl BindingScope {
    fn enter(bindings: HelperBindings) -> Self {
        let previous = BINDINGS.with(|slot| slot.replace(Some(bindings)));
        Self { previous }
    }
}

impl Drop for BindingScope {
    fn drop(&mut self) {
        let previous = self.previous.take();
        BINDINGS.with(|slot| {
            slot.replace(previous);
        });
    }
}

#[derive(Debug, Clone, Copy)]
enum Helper {
    CsrfField,
    CurrentUser,
    Errors,
}

impl Helper {
    const ALL: [Helper; 3] = [Helper::CsrfField, Helper::CurrentUser, Helper::Errors];

    fn name(self) -> &'static str {
        match self {
            Helper::CsrfField => "csrf_field",
            Helper::CurrentUser => "current_user",
            Helper::Errors => "errors",
        }
    }
}

impl tera::Function for Helper {
    fn call(&self, _args: &HashMap<String, Value>) -> tera::Result<Value> {
        BINDINGS.with(|slot| match slot.borrow().as_ref() {
            Some(bindings) => Ok(match self {
                Helper::CsrfField => bindings.csrf_field.clone(),
                Helper::CurrentUser => bindings.current_user.clone(),
                Helper::Errors => bindings.errors.clone(),
            }),
            None => {
                error!(
                    helper = self.name(),
                    "Template helper called outside of a request render"
                );
                Err(tera::Error::msg(format!(
                    "{}() is only available while rendering a request",
                    self.name()
                )))
            }
        })
    }

    fn is_safe(&self) -> bool {
        matches!(self, Helper::CsrfField)
    }
}

/// Register the request-scoped helpers on a freshly created [`Tera`].
pub(super) fn register_helpers(tera: &mut Tera) {
    for helper in Helper::ALL {
        tera.register_function(helper.name(), helper);
    }
}

// =============================================================================
// Execution
// =============================================================================

impl TemplateSet {
    /// Render the entry fragment with `data` and the request's helpers.
    ///
    /// Each error in `errors` contributes its public message to `errors()`,
    /// or the generic message when it has none.
    pub fn render<T: Serialize>(
        &self,
        ctx: &RenderContext,
        data: &T,
        errors: &[&dyn PublicMessage],
    ) -> Result<String, TemplateError> {
        let context = Context::from_serialize(data).map_err(TemplateError::Context)?;
        let bindings = HelperBindings::new(ctx, errors);

        let _scope = BindingScope::enter(bindings);
        self.tera
            .render(self.entry(), &context)
            .map_err(|source| TemplateError::Execute {
                template: self.entry().to_string(),
                source,
            })
    }

    /// Render into a complete response.
    ///
    /// Success is `200 text/html; charset=utf-8` with the full buffer. Any
    /// failure is logged with its error chain and answered with a plain
    /// `500`; partial output is never sent.
    pub fn execute<T: Serialize>(
        &self,
        ctx: &RenderContext,
        data: &T,
        errors: &[&dyn PublicMessage],
    ) -> Response {
        match self.render(ctx, data, errors) {
            Ok(body) => Html(body).into_response(),
            Err(err) => {
                error!(
                    set = self.name(),
                    error_type = "template",
                    status = 500u16,
                    "Template execution failed: {}",
                    error_chain(&err)
                );
                (StatusCode::INTERNAL_SERVER_ERROR, TEMPLATE_FAILURE_MESSAGE).into_response()
            }
        }
    }
}

/// Join an error and all of its sources into one line.
fn error_chain(err: &dyn StdError) -> String {
    let mut chain = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push_str(": ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }
    chain
}
