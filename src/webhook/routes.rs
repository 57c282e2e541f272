use ntex::web;

/// Configures the payment gateway webhook routes. They are public endpoints,
/// deliveries authenticate with their signature.
///
/// # Routes
/// - `GET /webhook` - Status probe
/// - `POST /webhook` - Payment gateway webhook receiver
pub fn payment(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/webhook").service((super::payment::status, super::payment::receive)));
}
