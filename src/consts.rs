pub const WEBHOOK_SIGNATURE_HEADER: &str = "webhook-signature";
pub const WEBHOOK_ID_HEADER: &str = "webhook-id";
pub const WEBHOOK_TIMESTAMP_HEADER: &str = "webhook-timestamp";

pub const WEBHOOK_SECRET_PREFIX: &str = "whsec_";
pub const WEBHOOK_SIGNATURE_VERSION: &str = "v1";

/// `bookingType` written into checkout metadata for hall rentals
pub const HALL_BOOKING_MARKER: &str = "hall_booking";

pub const PAYMENT_GATEWAY_NAME: &str = "yoco";

pub const RESEND_EMAILS_ENDPOINT: &str = "https://api.resend.com/emails";
pub const ORDERS_PAGE_URL: &str = "https://www.littlelattelane.co.za/account/orders";

// Proxy headers checked in order when identifying the caller
pub const CLIENT_IP_HEADERS: [&str; 3] = ["x-forwarded-for", "x-real-ip", "cf-connecting-ip"];
