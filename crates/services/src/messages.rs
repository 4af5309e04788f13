//! Maps backend failures to the fixed set of messages shown to users.
//!
//! There is no retry policy: the caller shows the message in a dismissible
//! dialog and the user decides what to do next.

use domains::{AuthFailure, DomainError};

/// The user-facing operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    SignIn,
    SignUp,
    SignOut,
    LoadProfile,
    SetNickname,
    LoadPosts,
    LoadPost,
    CreatePost,
    UpdatePost,
    DeletePost,
    IncrementViews,
    LoadComments,
    AddComment,
    AddReply,
    EditComment,
    DeleteComment,
}

impl Action {
    fn fallback(self) -> &'static str {
        match self {
            Action::SignIn => "An unknown error occurred.",
            Action::SignUp => "An error occurred during sign-up. Please try again.",
            Action::SignOut => "An error occurred while signing out.",
            Action::LoadProfile => "A problem occurred while loading your profile.",
            Action::SetNickname => "An error occurred while saving the nickname.",
            Action::LoadPosts => "An error occurred while loading data.",
            Action::LoadPost => "A problem occurred while loading the post.",
            Action::CreatePost => "An error occurred while creating the post. Please try again.",
            Action::UpdatePost => "A problem occurred while editing the post.",
            Action::DeletePost => "A problem occurred while deleting the post.",
            Action::IncrementViews => "Failed to update the view count.",
            Action::LoadComments => "A problem occurred while loading comments.",
            Action::AddComment => "A problem occurred while writing the comment.",
            Action::AddReply => "A problem occurred while writing the reply.",
            Action::EditComment => "A problem occurred while editing the comment.",
            Action::DeleteComment => "A problem occurred while deleting the comment.",
        }
    }
}

fn auth_message(failure: AuthFailure) -> &'static str {
    match failure {
        AuthFailure::InvalidEmail => "Invalid email format.",
        AuthFailure::UserNotFound => "This email is not registered.",
        AuthFailure::WrongPassword => "Incorrect password.",
        AuthFailure::TooManyRequests => "Too many sign-in attempts. Please try again later.",
        AuthFailure::EmailAlreadyInUse => "This email is already in use.",
        AuthFailure::WeakPassword => "Password must be at least 6 characters.",
        AuthFailure::InvalidToken => "Your session has expired. Please sign in again.",
    }
}

/// The message to show for `err` raised while performing `action`.
///
/// Validation and conflict messages are written for users already and pass
/// through; everything unexpected collapses to the action's fallback.
pub fn user_message(action: Action, err: &DomainError) -> String {
    match err {
        DomainError::ValidationError(msg) | DomainError::Conflict(msg) => msg.clone(),
        DomainError::Auth(failure) => auth_message(*failure).to_string(),
        DomainError::Unauthorized(_) => "Please sign in to continue.".to_string(),
        DomainError::Forbidden(_) => {
            "You can only modify your own posts and comments.".to_string()
        }
        DomainError::NotFound(entity, _) => match *entity {
            "Post" => "This post no longer exists.".to_string(),
            "Comment" => "This comment no longer exists.".to_string(),
            _ => action.fallback().to_string(),
        },
        DomainError::Internal(_) => action.fallback().to_string(),
    }
}
