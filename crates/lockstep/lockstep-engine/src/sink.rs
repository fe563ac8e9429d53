use lockstep_signals::OutputRecord;

/// Emission is skipped whenever the new tick count is an exact multiple of
/// this, so nine ticks out of every ten produce a record.
pub const EMIT_SKIP_MODULUS: u64 = 10;

/// True if the record for `tick` (the tick count just reached) is emitted.
#[inline]
pub fn emits_at(tick: u64) -> bool {
    tick % EMIT_SKIP_MODULUS != 0
}

/// Receives the per-tick snapshot. Called from the closing lane only.
pub trait OutputSink: Send {
    fn emit(&mut self, record: &OutputRecord);
}

impl<F> OutputSink for F
where
    F: FnMut(&OutputRecord) + Send,
{
    #[inline]
    fn emit(&mut self, record: &OutputRecord) {
        self(record)
    }
}

/// Discards every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl OutputSink for NullSink {
    #[inline]
    fn emit(&mut self, _record: &OutputRecord) {}
}
