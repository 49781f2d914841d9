use anyhow::{Context, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Decoded audio kept per channel, the way a playback tap hands it over.
pub struct DecodedAudio {
    pub channels: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn duration_secs(&self) -> f32 {
        self.frames() as f32 / self.sample_rate.max(1) as f32
    }
}

pub fn decode_channels(path: &Path) -> Result<DecodedAudio> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open audio file: {}", path.display()))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .context("Failed to probe audio format")?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .context("No audio tracks found")?;

    let track_id = track.id;
    // containers may omit the layout; the decoded packets are authoritative
    let declared_channels = track.codec_params.channels.map(|c| c.count());
    let sample_rate = track.codec_params.sample_rate.context("Unknown sample rate")?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Failed to create audio decoder")?;

    let mut channels: Vec<Vec<f32>> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(err)) => {
                log::warn!("Skipping undecodable packet: {}", err);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        let mut sample_buf = SampleBuffer::<f32>::new(decoded.frames() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        if !append_packet(sample_buf.samples(), spec.channels.count(), &mut channels) {
            log::warn!(
                "Skipping packet with {} channels, stream has {}",
                spec.channels.count(),
                channels.len()
            );
        }
    }

    if channels.is_empty() {
        channels = vec![Vec::new(); declared_channels.unwrap_or(1).max(1)];
    }
    if let Some(declared) = declared_channels.filter(|&n| n != channels.len()) {
        log::debug!("Container declared {} channels, decoded {}", declared, channels.len());
    }

    let audio = DecodedAudio {
        channels,
        sample_rate,
    };
    log::info!(
        "Decoded audio: {} frames x {} channels, {}Hz",
        audio.frames(),
        audio.channels.len(),
        sample_rate
    );
    Ok(audio)
}

/// The first packet fixes the channel layout. Returns false for a packet
/// that does not match it.
fn append_packet(interleaved: &[f32], packet_channels: usize, channels: &mut Vec<Vec<f32>>) -> bool {
    let count = packet_channels.max(1);
    if channels.is_empty() {
        channels.resize_with(count, Vec::new);
    } else if channels.len() != count {
        return false;
    }
    deinterleave(interleaved, channels);
    true
}

fn deinterleave(interleaved: &[f32], channels: &mut [Vec<f32>]) {
    let count = channels.len();
    for frame in interleaved.chunks_exact(count) {
        for (channel, &sample) in channels.iter_mut().zip(frame) {
            channel.push(sample);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deinterleaves_stereo() {
        let mut channels = vec![Vec::new(), Vec::new()];
        deinterleave(&[0.1, -0.1, 0.2, -0.2, 0.3, -0.3], &mut channels);
        assert_eq!(channels[0], vec![0.1, 0.2, 0.3]);
        assert_eq!(channels[1], vec![-0.1, -0.2, -0.3]);
    }

    #[test]
    fn layout_comes_from_first_packet() {
        let mut channels = Vec::new();
        assert!(append_packet(&[0.5, -0.5, 0.25, -0.25], 2, &mut channels));
        assert_eq!(channels, vec![vec![0.5, 0.25], vec![-0.5, -0.25]]);

        assert!(!append_packet(&[1.0, 1.0, 1.0], 1, &mut channels));
        assert_eq!(channels[0].len(), 2);
        assert!(append_packet(&[0.75, -0.75], 2, &mut channels));
        assert_eq!(channels[1], vec![-0.5, -0.25, -0.75]);
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = decode_channels(Path::new("/nonexistent/track.wav")).err().unwrap();
        assert!(format!("{:#}", err).contains("Failed to open audio file"));
    }

    #[test]
    fn duration_from_frames() {
        let audio = DecodedAudio {
            channels: vec![vec![0.0; 44_100]],
            sample_rate: 44_100,
        };
        assert_eq!(audio.frames(), 44_100);
        assert!((audio.duration_secs() - 1.0).abs() < 1e-6);
    }
}
