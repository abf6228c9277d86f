use crate::models::audio_models::AudioEncoding;
use crate::models::config::StreamConfiguration;
use crate::models::error::StreamError;
use crate::processing::mpeg_decoder::MpegDecoder;
use crate::processing::pcm_decoder::PcmDecoder;
use crate::processing::text_audio_demux::TextAudioDemux;
use crate::processing::wav_decoder::WavDecoder;
use crate::traits::audio_decoder::{AudioDecoder, TextCallback};

/// Widest UTF-8 encoding of one character.
const MAX_UTF8_WIDTH: u64 = 4;

/// Build the decoder chain for a stream.
///
/// The configuration is validated first; an invalid configuration is a
/// caller error and is returned rather than logged. With `text_events` set,
/// the audio decoder is wrapped in a [`TextAudioDemux`] that hands caption
/// text to `on_text`.
pub fn create_decoder(
    config: &StreamConfiguration,
    on_text: Option<TextCallback>,
) -> Result<Box<dyn AudioDecoder>, StreamError> {
    config.validate().map_err(StreamError::ConfigurationFailed)?;

    let audio: Box<dyn AudioDecoder> = match config.encoding {
        AudioEncoding::Pcm => Box::new(PcmDecoder::new(
            config.pcm_sample_type,
            config.channels,
            config.sample_rate,
        )),
        AudioEncoding::Mp3 => Box::new(MpegDecoder::new(config.channels, config.sample_rate)),
        AudioEncoding::Wav => Box::new(WavDecoder::new(
            config.pcm_sample_type,
            config.channels,
            config.sample_rate,
        )),
    };

    if !config.text_events {
        return Ok(audio);
    }

    let max_text_bytes = config.max_text_len as u64 * MAX_UTF8_WIDTH;
    let max_audio_bytes = config.max_audio_record_bytes();
    log::debug!(
        "Text/audio demux enabled (text <= {} bytes, audio <= {} bytes per record)",
        max_text_bytes,
        max_audio_bytes
    );
    Ok(Box::new(TextAudioDemux::new(audio, on_text, max_text_bytes, max_audio_bytes)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::models::audio_models::PcmSampleType;
    use crate::processing::pcm_decoder::encode_pcm;
    use crate::processing::text_audio_demux::encode_record;
    use crate::processing::wav_format::encode_wav;

    fn decode(decoder: &mut dyn AudioDecoder, data: &[u8]) -> Vec<f32> {
        let mut out = Vec::new();
        decoder.decode(data, &mut |s: &[f32]| out.extend_from_slice(s));
        out
    }

    #[test]
    fn pcm_uses_configured_sample_type() {
        let config = StreamConfiguration {
            pcm_sample_type: PcmSampleType::Int32,
            sample_rate: 16000,
            ..Default::default()
        };
        let mut decoder = create_decoder(&config, None).unwrap();
        assert_eq!(decoder.sample_rate(), 16000);

        let samples = decode(decoder.as_mut(), &encode_pcm(&[0.5, -0.5], PcmSampleType::Int32));
        assert_eq!(samples.len(), 2);
    }

    #[test]
    fn wav_reads_its_own_header() {
        let config = StreamConfiguration {
            encoding: AudioEncoding::Wav,
            ..Default::default()
        };
        let mut decoder = create_decoder(&config, None).unwrap();
        let samples = decode(decoder.as_mut(), &encode_wav(&[0.1; 8], 44100, 2));
        assert_eq!(samples.len(), 8);
        assert_eq!(decoder.channels(), 2);
        assert_eq!(decoder.sample_rate(), 44100);
    }

    #[test]
    fn mp3_decoder_starts_with_configured_format() {
        let config = StreamConfiguration {
            encoding: AudioEncoding::Mp3,
            channels: 2,
            sample_rate: 48000,
            ..Default::default()
        };
        let decoder = create_decoder(&config, None).unwrap();
        assert_eq!(decoder.channels(), 2);
        assert_eq!(decoder.sample_rate(), 48000);
    }

    #[test]
    fn text_events_wrap_in_demux() {
        let texts = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&texts);
        let config = StreamConfiguration {
            text_events: true,
            ..Default::default()
        };
        let on_text: TextCallback = Arc::new(move |t: &str| sink.lock().push(t.to_owned()));
        let mut decoder = create_decoder(&config, Some(on_text)).unwrap();

        let record = encode_record(Some("caption"), Some(&encode_pcm(&[0.2; 3], PcmSampleType::Int16)));
        assert_eq!(decode(decoder.as_mut(), &record).len(), 3);
        assert_eq!(*texts.lock(), vec!["caption".to_string()]);
    }

    #[test]
    fn invalid_configuration_is_returned() {
        let config = StreamConfiguration {
            channels: 3,
            ..Default::default()
        };
        assert!(matches!(
            create_decoder(&config, None),
            Err(StreamError::ConfigurationFailed(_))
        ));
    }
}
