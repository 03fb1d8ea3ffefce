use std::io::Cursor;

use hound::{SampleFormat, WavSpec, WavWriter};
use vadscope_core::render::markup;
use vadscope_core::{
    encode_data_uri, map_spans, AudioLoader, DetectorHandle, EnergySegmenter, LabelColorMap,
    LoaderConfig, SpeechSegmenter, SpeechSpan, VadScopeError, Waveform,
};

/// A segmenter that counts invocations, for asserting the loader rejects bad
/// input before any model work happens.
struct CountingSegmenter {
    calls: usize,
}

impl SpeechSegmenter for CountingSegmenter {
    fn segment(
        &mut self,
        _waveform: &Waveform,
    ) -> vadscope_core::error::Result<Vec<SpeechSpan>> {
        self.calls += 1;
        Ok(vec![])
    }
}

/// 0.5 s silence, 1 s of a 440 Hz tone, 0.5 s silence — mono 16 kHz wav.
fn tone_upload() -> Vec<u8> {
    let rate = 16_000u32;
    let mut samples = vec![0.0f32; rate as usize / 2];
    samples.extend(
        (0..rate as usize).map(|i| (i as f32 * 440.0 * 2.0 * std::f32::consts::PI / rate as f32).sin() * 0.5),
    );
    samples.extend(vec![0.0f32; rate as usize / 2]);

    let spec = WavSpec {
        channels: 1,
        sample_rate: rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
        for &s in &samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

#[test]
fn upload_flows_end_to_end_into_widget_markup() {
    let loader = AudioLoader::new(LoaderConfig::default());
    let detector = DetectorHandle::new(EnergySegmenter::default());

    let bytes = tone_upload();
    let info = loader.probe(&bytes).unwrap();
    assert_eq!(info.sample_rate, 16_000);

    let waveform = loader.load(&bytes).unwrap();
    assert_eq!(waveform.sample_rate, 16_000);
    assert!((waveform.duration_secs() - 2.0).abs() < 1e-9);

    let spans = detector.segment(&waveform).unwrap();
    assert_eq!(spans.len(), 1, "expected one speech span, got {spans:?}");
    // The tone occupies [0.5 s, 1.5 s); allow a frame of slack either side
    // plus the hangover tail.
    let start_secs = spans[0].start as f64 / 16_000.0;
    let end_secs = spans[0].end as f64 / 16_000.0;
    assert!((start_secs - 0.5).abs() < 0.05, "start at {start_secs}");
    assert!(end_secs >= 1.5 && end_secs < 1.9, "end at {end_secs}");

    let mut colors = LabelColorMap::new();
    let (regions, legend) = map_spans(&spans, waveform.sample_rate, &mut colors);
    assert_eq!(regions.len(), 1);
    assert_eq!(legend.len(), 1);
    assert_eq!(legend[0].label, "SPEECH");

    let data_uri = encode_data_uri(&waveform).unwrap();
    assert!(data_uri.starts_with("data:audio/x-wav;base64,"));

    let template = "<script>var uri = 'BASE64'; REGIONS</script>";
    let html = markup::render_template(template, &data_uri, &regions);
    assert!(html.contains("wavesurfer.addRegion"));
    assert!(html.contains("resize : false, drag : false"));
    assert!(html.contains(&data_uri));
}

#[test]
fn corrupt_upload_fails_before_the_detector_runs() {
    let loader = AudioLoader::new(LoaderConfig::default());
    let mut detector = CountingSegmenter { calls: 0 };

    let outcome = loader
        .probe(b"not an audio container at all")
        .and_then(|_| loader.load(b"not an audio container at all"))
        .and_then(|waveform| detector.segment(&waveform));

    let err = outcome.unwrap_err();
    assert!(matches!(err, VadScopeError::Decode(_)), "got {err:?}");
    assert!(err.is_user_input());
    assert_eq!(detector.calls, 0, "detector must not run on a failed decode");
}

#[test]
fn silent_upload_yields_an_empty_page_fragment() {
    let rate = 16_000u32;
    let spec = WavSpec {
        channels: 1,
        sample_rate: rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
        for _ in 0..rate {
            writer.write_sample(0.0f32).unwrap();
        }
        writer.finalize().unwrap();
    }

    let loader = AudioLoader::new(LoaderConfig::default());
    let detector = DetectorHandle::new(EnergySegmenter::default());

    let waveform = loader.load(&cursor.into_inner()).unwrap();
    let spans = detector.segment(&waveform).unwrap();
    assert!(spans.is_empty());

    let mut colors = LabelColorMap::new();
    let (regions, legend) = map_spans(&spans, waveform.sample_rate, &mut colors);
    assert!(regions.is_empty());
    assert!(legend.is_empty());
    assert!(markup::region_statements(&regions).is_empty());
    assert!(markup::legend_items(&legend).is_empty());
}
