//! Answer Assembler.
//!
//! Builds the narrative for a validated answer from the template matching the
//! query type, and collects one citation per distinct dataset. An answer with
//! no supporting records is rendered with the `unavailable` template, carries
//! no citations and is always labelled `low`.

use crate::analysis::{
    is_estimate, location_totals, metrics_present, percent_change, rainfall_correlation, strength,
    yearly_series, Figure, MIN_CORRELATION_PAIRS,
};
use crate::router::AnalysisOp;
use crate::types::{AnnotatedRecord, AnswerPayload, Citation, ConfidenceLabel, QualityAssessment, QueryDescriptor};
use samarth_core::AppResult;
use samarth_narrative::{NarrativeContext, NarrativeKind, NarrativeRow, TemplateSet};
use samarth_sources::Metric;
use std::collections::HashMap;

/// Record rows shown in a lookup answer.
const MAX_LOOKUP_ROWS: usize = 12;

/// One citation per distinct `(dataset_url, ministry_name)`, in first-seen order.
pub fn citations(records: &[AnnotatedRecord]) -> Vec<Citation> {
    let mut citations: Vec<Citation> = Vec::new();

    for annotated in records {
        let record = &annotated.record;
        let existing = citations
            .iter_mut()
            .find(|c| c.dataset_url == record.dataset_url && c.ministry_name == record.ministry_name);

        match existing {
            Some(citation) => {
                if record.observed_at > citation.last_updated {
                    citation.last_updated = record.observed_at;
                }
            }
            None => citations.push(Citation {
                dataset_url: record.dataset_url.clone(),
                ministry_name: record.ministry_name.clone(),
                last_updated: record.observed_at,
            }),
        }
    }

    citations
}

/// Maps records to their 1-based citation numbers.
struct Markers<'a> {
    numbers: HashMap<(&'a str, &'a str), usize>,
    records: &'a [AnnotatedRecord],
}

impl<'a> Markers<'a> {
    fn new(records: &'a [AnnotatedRecord], citations: &'a [Citation]) -> Self {
        let numbers = citations
            .iter()
            .enumerate()
            .map(|(i, c)| ((c.dataset_url.as_str(), c.ministry_name.as_str()), i + 1))
            .collect();
        Self { numbers, records }
    }

    /// "[1]" or "[1, 3]" for the given record indices.
    fn for_members(&self, members: &[usize]) -> String {
        let mut numbers: Vec<usize> = members
            .iter()
            .filter_map(|i| self.records.get(*i))
            .filter_map(|r| {
                self.numbers
                    .get(&(r.record.dataset_url.as_str(), r.record.ministry_name.as_str()))
                    .copied()
            })
            .collect();
        numbers.sort_unstable();
        numbers.dedup();

        let joined = numbers.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(", ");
        format!("[{}]", joined)
    }
}

/// Renders answers from validated records.
#[derive(Debug)]
pub struct Assembler {
    templates: TemplateSet,
}

impl Assembler {
    pub fn new(templates: TemplateSet) -> Self {
        Self { templates }
    }

    /// Assembler with the built-in templates only.
    pub fn builtin() -> AppResult<Self> {
        Ok(Self::new(TemplateSet::builtin()?))
    }

    /// Build the answer payload. Provenance is left empty for the caller.
    pub fn assemble(
        &self,
        descriptor: &QueryDescriptor,
        operations: &[AnalysisOp],
        records: Vec<AnnotatedRecord>,
        mut quality: QualityAssessment,
    ) -> AppResult<AnswerPayload> {
        if records.is_empty() {
            quality.confidence_label = ConfidenceLabel::Low;
            let context = NarrativeContext {
                question: descriptor.raw_text.clone(),
                scope: scope(descriptor),
                ..NarrativeContext::default()
            };
            let rendered = self.templates.render(NarrativeKind::Unavailable, &context)?;

            return Ok(AnswerPayload {
                narrative_text: rendered.text,
                supporting_records: Vec::new(),
                citations: Vec::new(),
                quality,
                descriptor: descriptor.clone(),
                provenance: Vec::new(),
                template_id: rendered.template_id,
            });
        }

        let citations = citations(&records);
        let markers = Markers::new(&records, &citations);
        let present = metrics_present(&records);
        let focus = focus_metric(descriptor, &present);

        let mut context = NarrativeContext {
            question: descriptor.raw_text.clone(),
            scope: scope(descriptor),
            ..NarrativeContext::default()
        };

        let mut kind = descriptor.query_type.narrative_kind();
        if operations.contains(&AnalysisOp::RainfallCorrelation) {
            correlation(&mut context, descriptor, &records, &markers);
            kind = NarrativeKind::Correlation;
        } else if operations.contains(&AnalysisOp::YearlySeries) {
            trend(&mut context, descriptor, &records, &markers, focus);
            kind = NarrativeKind::Trend;
        } else if operations.contains(&AnalysisOp::LocationTotals) {
            comparison(&mut context, descriptor, &records, &markers, focus, &present);
            kind = NarrativeKind::Comparison;
        } else {
            lookup(&mut context, descriptor, &records, &markers, focus);
        }

        context.caveats.push(quality.summary());
        context.caveats.extend(quality.issues.iter().cloned());

        let rendered = self.templates.render(kind, &context)?;

        Ok(AnswerPayload {
            narrative_text: rendered.text,
            supporting_records: records,
            citations,
            quality,
            descriptor: descriptor.clone(),
            provenance: Vec::new(),
            template_id: rendered.template_id,
        })
    }
}

fn lookup(
    context: &mut NarrativeContext,
    descriptor: &QueryDescriptor,
    records: &[AnnotatedRecord],
    markers: &Markers<'_>,
    focus: Metric,
) {
    let figures = location_totals(records, &descriptor.locations, focus);
    context.headline = match figures.as_slice() {
        [single] => format!(
            "{} in {} was {} {}.",
            capitalize(&subject(descriptor, focus)),
            single.label,
            format_value(single.value, focus),
            focus.unit()
        ),
        _ => format!(
            "Found {} records across {} locations for {}.",
            records.len(),
            figures.len(),
            context.scope
        ),
    };

    for (index, annotated) in records.iter().enumerate().take(MAX_LOOKUP_ROWS) {
        let record = &annotated.record;
        let mut label = record.entity_key.location.clone();
        if let Some(district) = &record.district {
            label.push_str(&format!(", {}", district));
        }
        if let Some(crop) = &record.entity_key.crop {
            label.push_str(&format!(" {}", crop));
        }
        label.push_str(&format!(" {}", record.entity_key.metric.label()));
        if let Some(year) = record.entity_key.year {
            label.push_str(&format!(" ({})", year));
        }

        context.rows.push(NarrativeRow {
            label,
            value: format_value(record.value, record.entity_key.metric),
            unit: record.unit.clone(),
            source: source_note(markers.for_members(&[index]), annotated),
        });
    }

    if records.len() > MAX_LOOKUP_ROWS {
        context.findings.push(format!(
            "Showing {} of {} records; the full set is in the supporting records.",
            MAX_LOOKUP_ROWS,
            records.len()
        ));
    }
}

fn comparison(
    context: &mut NarrativeContext,
    descriptor: &QueryDescriptor,
    records: &[AnnotatedRecord],
    markers: &Markers<'_>,
    focus: Metric,
    present: &[Metric],
) {
    let mut ranked = location_totals(records, &descriptor.locations, focus);
    ranked.sort_by(|a, b| b.value.total_cmp(&a.value));
    let subject = subject(descriptor, focus);

    context.headline = match ranked.as_slice() {
        [] => format!("No {} figures were returned for {}.", subject, context.scope),
        [only] => format!(
            "Only {} returned {} figures: {} {}.",
            only.label,
            subject,
            format_value(only.value, focus),
            focus.unit()
        ),
        [top, rest @ ..] => {
            let others = rest
                .iter()
                .map(|f| format!("{} ({} {})", f.label, format_value(f.value, focus), focus.unit()))
                .collect::<Vec<_>>();
            format!(
                "{} has the highest {} at {} {}, followed by {}.",
                top.label,
                subject,
                format_value(top.value, focus),
                focus.unit(),
                join_and(&others)
            )
        }
    };

    if let (Some(top), Some(bottom)) = (ranked.first(), ranked.last()) {
        if ranked.len() > 1 && bottom.value > 0.0 {
            context.findings.push(format!(
                "{}'s {} is {:.2} times {}'s.",
                top.label,
                subject,
                top.value / bottom.value,
                bottom.label
            ));
        }
    }

    for location in &descriptor.locations {
        if !ranked.iter().any(|f| &f.label == location) {
            context
                .findings
                .push(format!("No {} figures were returned for {}.", subject, location));
        }
    }

    // Focus metric first, then every other metric present
    let mut metrics = vec![focus];
    metrics.extend(present.iter().copied().filter(|m| *m != focus));
    for metric in metrics {
        let figures = if metric == focus {
            ranked.clone()
        } else {
            location_totals(records, &descriptor.locations, metric)
        };
        for figure in &figures {
            let label = if metric == focus {
                figure.label.clone()
            } else {
                format!("{} {}", figure.label, metric.label())
            };
            context.rows.push(figure_row(label, figure, records, markers));
        }
    }
}

fn trend(
    context: &mut NarrativeContext,
    descriptor: &QueryDescriptor,
    records: &[AnnotatedRecord],
    markers: &Markers<'_>,
    focus: Metric,
) {
    let series = yearly_series(records, focus);
    let subject = capitalize(&subject(descriptor, focus));

    context.headline = match (percent_change(&series), series.first(), series.last()) {
        (Some(change), Some(first), Some(last)) => {
            let direction = if change > 0.0 {
                format!("rose by {:.1}%", change)
            } else if change < 0.0 {
                format!("fell by {:.1}%", change.abs())
            } else {
                "was unchanged".to_string()
            };
            format!(
                "{} in {} {} from {} to {}.",
                subject,
                place(descriptor),
                direction,
                first.label,
                last.label
            )
        }
        _ => format!(
            "Only {} year(s) of {} data are available for {}, so no trend can be computed.",
            series.len(),
            focus.label(),
            context.scope
        ),
    };

    if series.len() > 1 {
        let peak = series.iter().max_by(|a, b| a.value.total_cmp(&b.value));
        let low = series.iter().min_by(|a, b| a.value.total_cmp(&b.value));
        if let (Some(peak), Some(low)) = (peak, low) {
            context.findings.push(format!(
                "Highest in {} ({} {}), lowest in {} ({} {}).",
                peak.label,
                format_value(peak.value, focus),
                focus.unit(),
                low.label,
                format_value(low.value, focus),
                focus.unit()
            ));
        }
    }

    for figure in &series {
        context
            .rows
            .push(figure_row(figure.label.clone(), figure, records, markers));
    }
}

fn correlation(
    context: &mut NarrativeContext,
    descriptor: &QueryDescriptor,
    records: &[AnnotatedRecord],
    markers: &Markers<'_>,
) {
    let result = rainfall_correlation(records, &descriptor.locations);
    let production = subject(descriptor, Metric::ProductionTonnes);

    context.headline = match result.coefficient {
        Some(r) => format!(
            "Across {} locations, annual rainfall and {} show a {} {} correlation (r = {:.2}).",
            result.pairs.len(),
            production,
            strength(r),
            if r >= 0.0 { "positive" } else { "negative" },
            r
        ),
        None if result.pairs.len() >= MIN_CORRELATION_PAIRS => format!(
            "Rainfall or {} does not vary across the {} locations, so no correlation can be measured.",
            production,
            result.pairs.len()
        ),
        None => format!(
            "There is not enough paired rainfall and {} data to measure a correlation for {} (found {} location(s), need at least {}).",
            production,
            context.scope,
            result.pairs.len(),
            MIN_CORRELATION_PAIRS
        ),
    };

    for (location, rain, crop) in &result.pairs {
        context
            .rows
            .push(figure_row(format!("{} rainfall", location), rain, records, markers));
        context
            .rows
            .push(figure_row(format!("{} {}", location, production), crop, records, markers));
    }
}

fn figure_row(label: String, figure: &Figure, records: &[AnnotatedRecord], markers: &Markers<'_>) -> NarrativeRow {
    let mut source = markers.for_members(&figure.members);
    if is_estimate(figure, records) {
        source.push_str(" (estimate)");
    }
    NarrativeRow {
        label,
        value: format_value(figure.value, figure.metric),
        unit: figure.metric.unit().to_string(),
        source,
    }
}

fn source_note(marker: String, annotated: &AnnotatedRecord) -> String {
    let mut note = marker;
    if annotated.record.is_fallback() {
        note.push_str(" (estimate)");
    }
    if annotated.is_flagged() {
        note.push_str(" (out of range)");
    }
    note
}

/// Metric the headline is about.
fn focus_metric(descriptor: &QueryDescriptor, present: &[Metric]) -> Metric {
    let mut preferences = Vec::new();
    if descriptor.requires_prices {
        preferences.push(Metric::ModalPricePerQuintal);
    }
    if descriptor.requires_climate && descriptor.crops.is_empty() {
        preferences.push(Metric::RainfallMm);
    }
    preferences.extend([
        Metric::ProductionTonnes,
        Metric::RainfallMm,
        Metric::ModalPricePerQuintal,
        Metric::AreaHectares,
        Metric::TemperatureC,
    ]);

    preferences
        .into_iter()
        .find(|m| present.contains(m))
        .unwrap_or(Metric::ProductionTonnes)
}

/// "rice production", "annual rainfall"
fn subject(descriptor: &QueryDescriptor, metric: Metric) -> String {
    let has_crop = !matches!(metric, Metric::RainfallMm | Metric::TemperatureC);
    if has_crop && !descriptor.crops.is_empty() {
        let crops: Vec<String> = descriptor.crops.iter().map(|c| c.to_lowercase()).collect();
        format!("{} {}", join_and(&crops), metric.label())
    } else {
        metric.label().to_string()
    }
}

/// "Rice in Maharashtra and Punjab (2021, 2022)"
fn scope(descriptor: &QueryDescriptor) -> String {
    let what = if !descriptor.crops.is_empty() {
        join_and(&descriptor.crops.iter().cloned().collect::<Vec<_>>())
    } else if descriptor.requires_climate {
        "Agricultural and climate data".to_string()
    } else {
        "Agricultural data".to_string()
    };

    let mut scope = format!("{} in {}", what, place(descriptor));
    if !descriptor.years.is_empty() {
        let years: Vec<String> = descriptor.years.iter().map(|y| y.to_string()).collect();
        scope.push_str(&format!(" ({})", years.join(", ")));
    }
    scope
}

fn place(descriptor: &QueryDescriptor) -> String {
    if descriptor.locations.is_empty() {
        "India".to_string()
    } else {
        join_and(&descriptor.locations.iter().cloned().collect::<Vec<_>>())
    }
}

fn join_and(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [one] => one.clone(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Thousands-grouped value; rainfall and temperature keep one decimal.
pub fn format_value(value: f64, metric: Metric) -> String {
    let decimals = match metric {
        Metric::RainfallMm | Metric::TemperatureC => 1,
        _ => 0,
    };
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (formatted.clone(), None),
    };

    let digits: Vec<char> = int_part.chars().collect();
    let mut grouped = String::new();
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*c);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    match frac_part {
        Some(frac) => format!("{}{}.{}", sign, grouped, frac),
        None => format!("{}{}", sign, grouped),
    }
}
