use fare_core::trip::TripForm;

#[derive(Debug, Clone, Default)]
pub struct PageView {
    pub form: TripForm,
    pub message: Option<String>,
    pub is_error: bool,
    pub chart_url: Option<String>,
}

impl PageView {
    pub fn failure(form: &TripForm, message: String) -> Self {
        Self {
            form: form.clone(),
            message: Some(message),
            is_error: true,
            chart_url: None,
        }
    }

    pub fn success(form: &TripForm, message: String, chart_url: Option<String>) -> Self {
        Self {
            form: form.clone(),
            message: Some(message),
            is_error: false,
            chart_url,
        }
    }
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn field(value: &Option<String>) -> String {
    escape_html(value.as_deref().unwrap_or_default())
}

pub fn render(view: &PageView) -> String {
    let mut body = String::new();

    if let Some(message) = &view.message {
        let class = if view.is_error { "error" } else { "prediction" };
        body.push_str(&format!(
            "    <p class=\"{class}\">{}</p>\n",
            escape_html(message)
        ));
    }
    if let Some(url) = &view.chart_url {
        body.push_str(&format!(
            "    <img class=\"trend\" src=\"{}\" alt=\"Estimated price trend over the last 48 hours\">\n",
            escape_html(url)
        ));
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Flight Fare Estimator</title>
  <style>
    body {{ font-family: sans-serif; max-width: 1280px; margin: 2rem auto; }}
    form {{ display: grid; grid-template-columns: 8rem 16rem; gap: .5rem; }}
    .error {{ color: #b00020; }}
    .prediction {{ font-weight: bold; }}
    img.trend {{ max-width: 100%; }}
  </style>
</head>
<body>
  <h1>Flight Fare Estimator</h1>
  <form method="post" action="/">
    <label for="source">Source</label>
    <input id="source" name="source" value="{source}" placeholder="Bengaluru">
    <label for="destination">Destination</label>
    <input id="destination" name="destination" value="{destination}" placeholder="New Delhi">
    <label for="date">Date</label>
    <input id="date" name="date" type="date" value="{date}">
    <label for="time">Time</label>
    <input id="time" name="time" type="time" value="{time}">
    <span></span>
    <button type="submit">Estimate</button>
  </form>
{body}</body>
</html>
"#,
        source = field(&view.form.source),
        destination = field(&view.form.destination),
        date = field(&view.form.date),
        time = field(&view.form.time),
    )
}
