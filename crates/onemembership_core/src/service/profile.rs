//! Profile validation shared by users and service providers.

use super::common_service::CommonService;
use crate::validation::{check_profile_format, is_blank, ErrMap, NormalizedProfile, ProfileInput};

/// Unique fields of an already stored profile.
pub(crate) struct StoredProfile<'a> {
    pub user_name: &'a str,
    pub email: &'a str,
    pub phone_number: &'a str,
}

/// What a submitted profile is compared against for uniqueness.
pub(crate) enum Baseline<'a> {
    /// Profile being created: every non-empty field is checked.
    New,
    /// Profile being updated: only fields that differ are checked.
    Stored(StoredProfile<'a>),
    /// Update of a record that could not be loaded: nothing is checked.
    Missing,
}

/// Runs format checks, then uniqueness checks against `table`.
pub(crate) fn validate_profile(
    common: &CommonService<'_>,
    table: &str,
    input: ProfileInput<'_>,
    baseline: Baseline<'_>,
    errors: &mut ErrMap,
) -> NormalizedProfile {
    let normalized = check_profile_format(input, errors);

    let check_all = matches!(baseline, Baseline::New);
    let previous = match &baseline {
        Baseline::Stored(stored) => Some(stored),
        _ => None,
    };
    let changed = |field: &str, stored: Option<&str>| -> bool {
        match stored {
            Some(stored) => field != stored,
            None => check_all,
        }
    };

    if !errors.contains("user_name")
        && !is_blank(&normalized.user_name)
        && changed(&normalized.user_name, previous.map(|p| p.user_name))
        && !common.is_unique("user_name", &normalized.user_name, table)
    {
        errors.insert("user_name", "username is taken, username should be unique");
    }

    if !errors.contains("email")
        && !is_blank(input.email)
        && changed(input.email, previous.map(|p| p.email))
        && !common.is_unique("email", input.email, table)
    {
        errors.insert("email", "email address already exists");
    }

    if normalized.phone_is_valid
        && changed(&normalized.phone_number, previous.map(|p| p.phone_number))
        && !common.is_unique("phone_number", &normalized.phone_number, table)
    {
        errors.insert("phone_number", "phone number already exists");
    }

    normalized
}
