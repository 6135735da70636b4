//! FAQ assistant: browse canned answers by category, or leave a contact when
//! nothing fits.

use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{AssistantCategory, AssistantQuestion, NewSupportRequest, SupportRequest},
    store::Store,
};

const MAX_NAME_CHARS: usize = 100;
const MAX_CONTACT_CHARS: usize = 150;

#[derive(Serialize, Debug, Clone)]
pub struct FaqView {
    pub categories: Vec<AssistantCategory>,
    pub current_category: Option<AssistantCategory>,
    pub questions: Vec<AssistantQuestion>,
}

/// Falls back to the first category when `requested` is absent or unknown.
pub async fn faq(store: &dyn Store, requested: Option<Uuid>) -> AppResult<FaqView> {
    let categories = store.assistant_categories().await?;
    let current_category = requested
        .and_then(|id| categories.iter().find(|c| c.id == id))
        .or_else(|| categories.first())
        .cloned();
    let questions = match &current_category {
        Some(c) => store.assistant_questions(c.id).await?,
        None => Vec::new(),
    };
    Ok(FaqView {
        categories,
        current_category,
        questions,
    })
}

fn validate(req: &NewSupportRequest) -> AppResult<()> {
    let name = req.name.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_CHARS {
        return Err(AppError::validation(format!("name must be 1 to {MAX_NAME_CHARS} characters")));
    }
    let contact = req.contact.trim();
    if contact.is_empty() || contact.chars().count() > MAX_CONTACT_CHARS {
        return Err(AppError::validation(format!(
            "contact must be 1 to {MAX_CONTACT_CHARS} characters"
        )));
    }
    if req.message.trim().is_empty() {
        return Err(AppError::validation("message is required"));
    }
    Ok(())
}

pub async fn submit_support_request(
    store: &dyn Store,
    req: &NewSupportRequest,
) -> AppResult<SupportRequest> {
    validate(req)?;
    let saved = store.insert_support_request(req).await?;
    tracing::info!(request_id = %saved.id, "support request received");
    Ok(saved)
}
