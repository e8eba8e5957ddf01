use randping_types::models::CountryCode;

pub const WELCOME_TEXT: &str = "Notifications are working! You can now receive pings.";

/// Text shown to the recipient of a ping.
///
/// Replies never reveal where the sender is.
pub fn ping_text(is_reply: bool, display_country_of_origin: bool, origin: Option<&CountryCode>) -> String {
    if is_reply {
        return "Somebody pinged you back!".to_string();
    }

    match origin {
        Some(country) if display_country_of_origin => {
            format!("Somebody from {} pinged you!", country.flag_emoji())
        }
        _ => "Somebody pinged you!".to_string(),
    }
}
