/// Dutch banner text for an error message shown to dashboard users.
///
/// Known authentication messages get their own translation; anything else
/// falls back to a generic localized message.
pub fn localize(message: &str) -> &'static str {
    match message {
        "Invalid login credentials" | "Invalid credentials" => "Ongeldige inloggegevens",
        "Email not confirmed" => "E-mailadres niet bevestigd",
        "Invalid email or password" => "Ongeldig e-mailadres of wachtwoord",
        "Invalid email" => "Ongeldig e-mailadres",
        "Password too short" => "Wachtwoord is te kort",
        "Email already registered" => "E-mailadres is al geregistreerd",
        "Failed to login" => "Inloggen mislukt",
        "Too many requests" | "Email rate limit exceeded" | "Password rate limit exceeded" => {
            "Te veel pogingen, probeer het later opnieuw"
        }
        "User not found" => "Gebruiker niet gevonden",
        "Missing Authorization header" | "Invalid Authorization header" => "Niet ingelogd",
        "Invalid or expired token" | "Access token required" => {
            "Sessie verlopen, log opnieuw in"
        }
        "Not connected to Microsoft" => "Niet verbonden met Microsoft, log opnieuw in",
        _ => "Er is een fout opgetreden",
    }
}

#[cfg(test)]
mod tests {
    use super::localize;

    #[test]
    fn translates_known_auth_messages() {
        assert_eq!(localize("Invalid login credentials"), "Ongeldige inloggegevens");
        assert_eq!(localize("User not found"), "Gebruiker niet gevonden");
        assert_eq!(
            localize("Email rate limit exceeded"),
            "Te veel pogingen, probeer het later opnieuw"
        );
    }

    #[test]
    fn unknown_messages_fall_back_to_generic_text() {
        assert_eq!(localize("connection reset by peer"), "Er is een fout opgetreden");
    }
}
