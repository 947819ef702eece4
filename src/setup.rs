//! Samples directory provisioning

use std::path::{Path, PathBuf};

use crate::storage::SamplesDir;
use crate::Result;

pub const SAMPLE_STORY_NAME: &str = "sample-story.txt";
pub const SAMPLE_AUDIO_NAME: &str = "sample-audio.mp3";

/// Bytes of silence appended after the sample MP3 header.
const SAMPLE_AUDIO_SILENCE_BYTES: usize = 100 * 1024;

const SAMPLE_STORY: &str = "The Sleepy Moon Adventure

Once upon a time a little rabbit named Luna watched the moon from her window every night.

One evening a silver moonbeam reached down to her sill and a soft voice asked her to come and visit.

Luna hopped along the beam of light and found the moon covered in soft silver sand, where moon rabbits tended gardens of crystal flowers.

They sang her the lullabies that drift down to sleeping children all over the world.

When it was time to go home, they gave her a crystal flower to remember them by.

From then on, whenever Luna looked up at the moon, her friends waved back.

The End.
";

/// What a provisioning run did.
#[derive(Debug, Default)]
pub struct SetupReport {
    pub created: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
}

/// Minimal MP3 test file: one frame header followed by silence.
pub fn sample_audio_bytes() -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xFB, 0x90, 0x00];
    bytes.resize(20, 0x00);
    bytes.resize(20 + SAMPLE_AUDIO_SILENCE_BYTES, 0x00);
    bytes
}

/// Create the samples directory and its sample files. Existing files are
/// left untouched.
pub async fn provision_samples(samples: &SamplesDir) -> Result<SetupReport> {
    samples.ensure().await?;

    let mut report = SetupReport::default();
    let files: [(&str, Vec<u8>); 2] = [
        (SAMPLE_STORY_NAME, SAMPLE_STORY.as_bytes().to_vec()),
        (SAMPLE_AUDIO_NAME, sample_audio_bytes()),
    ];

    for (name, contents) in files {
        let path = samples.path().join(name);
        if write_if_absent(&path, &contents).await? {
            tracing::info!(path = %path.display(), bytes = contents.len(), "Created sample file");
            report.created.push(path);
        } else {
            tracing::info!(path = %path.display(), "Sample file already exists");
            report.skipped.push(path);
        }
    }

    Ok(report)
}

async fn write_if_absent(path: &Path, contents: &[u8]) -> Result<bool> {
    if tokio::fs::try_exists(path).await? {
        return Ok(false);
    }
    tokio::fs::write(path, contents).await?;
    Ok(true)
}
