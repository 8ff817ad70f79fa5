use axum::extract::FromRequest;

use crate::error::AppError;

/// `Json` body whose rejections answer with the usual `{ message }` envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);
