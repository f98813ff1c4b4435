use std::io::Write;

/// 带颜色的单行日志格式：`[时间] 级别 [文件:行号] 内容`
fn format_record(buf: &mut env_logger::fmt::Formatter, record: &log::Record) -> std::io::Result<()> {
    let level_color = match record.level() {
        log::Level::Error => Some(anstyle::AnsiColor::Red),
        log::Level::Warn => Some(anstyle::AnsiColor::Yellow),
        log::Level::Info => Some(anstyle::AnsiColor::Green),
        _ => None,
    };
    let mut level_style = buf.default_level_style(record.level());
    if let Some(color) = level_color {
        level_style = level_style.fg_color(Some(anstyle::Color::Ansi(color)));
    }
    let location_style = anstyle::Style::new().fg_color(Some(anstyle::Color::Rgb(anstyle::RgbColor(110, 110, 110))));
    let message_style = anstyle::Style::new().fg_color(Some(anstyle::Color::Rgb(anstyle::RgbColor(75, 75, 75))));

    let line = record.line().unwrap_or(!0);
    let file = record.file().unwrap_or("").split(['\\', '/']).next_back().unwrap_or("");
    let time = chrono::Local::now().format("%H:%M:%S");
    let level = record.level();

    writeln!(
        buf,
        "{level_style}[{time}] {level}{level_style:#} {location_style}[{file}:{line}]{location_style:#} \
         {message_style}{}{message_style:#}",
        record.args()
    )
}

/// 默认 Info 级别，可以被 `RUST_LOG` 覆盖
pub fn init_log() {
    env_logger::Builder::new()
        .format(format_record)
        .filter(None, log::LevelFilter::Info)
        .parse_default_env()
        .init();
}

/// 测试中使用：输出交给 test harness 捕获，重复初始化不会 panic
pub fn init_test_log() {
    let _ = env_logger::Builder::new()
        .format(format_record)
        .filter(None, log::LevelFilter::Debug)
        .parse_default_env()
        .is_test(true)
        .try_init();
}
