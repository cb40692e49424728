use std::convert::Infallible;

use rocket::Request;
use rocket::request::{FromRequest, Outcome};

use crate::error::AppError;

use super::User;

/// Per-request authorization context. Admin capability comes from either the
/// shared-code `admin_mode` cookie or an authenticated admin account; handlers
/// check it explicitly instead of reading ambient session state.
#[derive(Debug, Clone, Copy)]
pub struct AdminContext {
    pub is_admin: bool,
}

impl AdminContext {
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(AppError::Authorization("Admin only".to_string()))
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminContext {
    type Error = Infallible;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        if request.cookies().get_private("admin_mode").is_some() {
            return Outcome::Success(AdminContext { is_admin: true });
        }

        let is_admin = matches!(
            request.guard::<User>().await,
            Outcome::Success(ref user) if user.is_admin()
        );

        Outcome::Success(AdminContext { is_admin })
    }
}
