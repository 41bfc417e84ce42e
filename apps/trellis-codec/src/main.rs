#![forbid(unsafe_code)]

use std::io::{Read, Write};

use trellis_codec::{init_tracing, run, CodecConfig};

fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = CodecConfig::from_env()?;
    let span = tracing::info_span!("trellis_codec", mode = config.mode.as_str());
    let _guard = span.enter();

    let mut input = Vec::new();
    if config.mode.reads_input() {
        // One byte past the limit is enough to report the overflow.
        let limit = u64::try_from(config.max_input_bytes)?.saturating_add(1);
        std::io::stdin().lock().take(limit).read_to_end(&mut input)?;
    }

    let output = run(&config, &input).inspect_err(|error| {
        tracing::warn!(event = "codec.run", outcome = "failed", %error);
    })?;

    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &output)?;
    writeln!(stdout)?;
    Ok(())
}
