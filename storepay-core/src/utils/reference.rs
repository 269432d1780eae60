/// Generate a new payment reference: `REF_{unix_millis}_{16 hex chars}`.
///
/// The timestamp keeps references roughly sortable in provider dashboards;
/// the 64 random bits make collisions negligible. Uniqueness is still
/// enforced by the `payments.reference` constraint.
pub fn generate_reference() -> String {
    let millis = time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    let suffix: [u8; 8] = rand::random();
    format!("REF_{millis}_{}", hex::encode(suffix))
}
