use crate::core::flows::RuntimeInputs;
use crate::core::flows::request::interpolate;

#[test]
fn static_text_passes_through() {
    let text = "Generate 5 to 7 topics.";
    assert_eq!(interpolate(text, &RuntimeInputs::new()).unwrap(), text);
}

#[test]
fn named_and_positional_placeholders_resolve() {
    let inputs = RuntimeInputs::new()
        .arg("first")
        .arg("second")
        .named("city", "Porto");
    assert_eq!(
        interpolate("{{1}}, {{ 0 }} in {{city}}", &inputs).unwrap(),
        "second, first in Porto"
    );
}

#[test]
fn missing_value_reports_the_placeholder() {
    let inputs = RuntimeInputs::new().arg("only");
    assert_eq!(interpolate("{{0}} and {{1}}", &inputs).unwrap_err(), "1");
    assert_eq!(
        interpolate("hello {{name}}", &RuntimeInputs::new()).unwrap_err(),
        "name"
    );
}

#[test]
fn unterminated_braces_are_literal() {
    let inputs = RuntimeInputs::new().named("a", "x");
    assert_eq!(interpolate("{{a}} and {{b", &inputs).unwrap(), "x and {{b");
}

#[test]
fn substituted_values_are_not_rescanned() {
    let inputs = RuntimeInputs::new().named("a", "{{b}}");
    assert_eq!(interpolate("[{{a}}]", &inputs).unwrap(), "[{{b}}]");
}
