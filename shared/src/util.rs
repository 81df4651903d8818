use rand::Rng;

/// 获取当前 UTC 时间戳（毫秒）
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// New random resource id (UUID v4)
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Alphabet without look-alike characters (0/O, 1/I/L)
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

fn random_code(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Guest-facing booking confirmation code, e.g. `K7QP2M`
pub fn confirmation_code() -> String {
    random_code(6)
}

/// Device-flow user code, e.g. `WDJB-MJHT`
pub fn user_code() -> String {
    let raw = random_code(8);
    format!("{}-{}", &raw[..4], &raw[4..])
}

/// Opaque device code handed to the polling device
pub fn device_code() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
