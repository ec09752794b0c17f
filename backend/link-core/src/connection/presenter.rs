/// Operator-facing output: QR codes, pairing codes and one-line status.
pub trait Presenter: Send + Sync {
    /// `refresh_index` starts at 1 and grows with every QR refresh.
    fn show_qr(&self, payload: &str, refresh_index: u32);

    fn show_pairing_code(&self, code: &str);

    fn status(&self, line: &str);
}
