/// Left-to-right embedding / pop directional formatting marks.
///
/// Parameter labels mix Latin digits and unit words; inside
/// right-to-left text they must be wrapped so the fragments keep their
/// visual order.
const LRE: char = '\u{202A}';
const PDF: char = '\u{202C}';

/// Display labels for machine parameters in one language
#[derive(Debug, Clone, Copy)]
pub struct ParamLabels {
    pub minutes: &'static str,
    pub seconds: &'static str,
    pub speed: &'static str,
    pub rtl: bool,
}

const EN: ParamLabels = ParamLabels {
    minutes: "min",
    seconds: "sec",
    speed: "speed",
    rtl: false,
};

const DE: ParamLabels = ParamLabels {
    minutes: "Min.",
    seconds: "Sek.",
    speed: "Stufe",
    rtl: false,
};

const FR: ParamLabels = ParamLabels {
    minutes: "min",
    seconds: "sec",
    speed: "vitesse",
    rtl: false,
};

const IT: ParamLabels = ParamLabels {
    minutes: "min",
    seconds: "sec",
    speed: "vel.",
    rtl: false,
};

const ES: ParamLabels = ParamLabels {
    minutes: "min",
    seconds: "seg",
    speed: "velocidad",
    rtl: false,
};

const AR: ParamLabels = ParamLabels {
    minutes: "دقيقة",
    seconds: "ثانية",
    speed: "سرعة",
    rtl: true,
};

const HE: ParamLabels = ParamLabels {
    minutes: "דקות",
    seconds: "שניות",
    speed: "מהירות",
    rtl: true,
};

/// Resolve parameter labels for a locale code.
///
/// Regional variants fall back to their base language ("de-AT" resolves
/// to German); unknown codes fall back to English.
pub fn labels_for(locale: &str) -> &'static ParamLabels {
    let base = locale
        .split(['-', '_'])
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();
    match base.as_str() {
        "de" => &DE,
        "fr" => &FR,
        "it" => &IT,
        "es" => &ES,
        "ar" => &AR,
        "he" | "iw" => &HE,
        _ => &EN,
    }
}

/// Render a duration in seconds as a compact display fragment
pub fn format_duration(secs: u32, labels: &ParamLabels) -> String {
    let minutes = secs / 60;
    let seconds = secs % 60;
    match (minutes, seconds) {
        (0, s) => format!("{s} {}", labels.seconds),
        (m, 0) => format!("{m} {}", labels.minutes),
        (m, s) => format!("{m} {} {s} {}", labels.minutes, labels.seconds),
    }
}

/// Assemble the parameter display string for a step.
///
/// Duration and temperature precede speed. For right-to-left locales the
/// assembled string is wrapped in explicit left-to-right embedding marks.
pub fn format_parameter_label(
    speed: &str,
    duration_secs: u32,
    temperature: &str,
    labels: &ParamLabels,
) -> String {
    let mut parts: Vec<String> = Vec::new();

    if duration_secs > 0 {
        parts.push(format_duration(duration_secs, labels));
    }
    if !temperature.is_empty() {
        if temperature.contains('°') {
            parts.push(temperature.to_string());
        } else {
            parts.push(format!("{temperature}°"));
        }
    }
    if !speed.is_empty() {
        parts.push(format!("{} {speed}", labels.speed));
    }

    let label = parts.join(" / ");
    if labels.rtl && !label.is_empty() {
        format!("{LRE}{label}{PDF}")
    } else {
        label
    }
}
