use crate::SessionOptions;

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Command line for the mirroring tool.
///
/// The device selector only appears when a device id is given; every other
/// flag is dropped when its value is empty, zero or false.
pub fn build_args(device_id: &str, options: &SessionOptions) -> Vec<String> {
    let mut args = Vec::with_capacity(8 + options.extra_args.len());

    if !device_id.is_empty() {
        args.extend(["-s".to_string(), device_id.to_string()]);
    }
    if let Some(bit_rate) = non_empty(&options.bit_rate) {
        args.extend(["--bit-rate".to_string(), bit_rate.to_string()]);
    }
    if options.max_size > 0 {
        args.extend(["--max-size".to_string(), options.max_size.to_string()]);
    }
    if options.max_fps > 0 {
        args.extend(["--max-fps".to_string(), options.max_fps.to_string()]);
    }
    if options.turn_screen_off {
        args.push("--turn-screen-off".to_string());
    }
    if options.fullscreen {
        args.push("--fullscreen".to_string());
    }
    if options.stay_awake {
        args.push("--stay-awake".to_string());
    }
    if let Some(record) = non_empty(&options.record) {
        args.extend(["--record".to_string(), record.to_string()]);
    }
    if let Some(title) = non_empty(&options.window_title) {
        args.extend(["--window-title".to_string(), title.to_string()]);
    }
    args.extend(options.extra_args.iter().cloned());

    args
}
