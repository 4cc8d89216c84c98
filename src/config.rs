/// Single shared secret gating all administrative methods. There is no
/// per-admin identity, rate limiting, or lockout.
const DEFAULT_ADMIN_SECRET: &str = "studio-front-desk";

pub fn admin_secret() -> String {
    std::env::var("STUDIOD_ADMIN_SECRET").unwrap_or_else(|_| DEFAULT_ADMIN_SECRET.to_string())
}
