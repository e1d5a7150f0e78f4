//! Minimal static string table (spec §2 `i18n`), grounded in the `i18n::tr`/
//! `i18n::MsgId` call sites in `original_source/src/aiz/tui/tui_core.cpp`.
//! Only `en` and `zh-CN` are shipped; any other tag falls back to `en`.

use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Lang {
    En = 0,
    ZhCn = 1,
}

static CURRENT_LANG: AtomicU8 = AtomicU8::new(Lang::En as u8);

/// Resolves a raw tag string (from `--lang`, `AI_Z_LANG`, `LC_ALL`, or
/// `LANG`) to a supported `Lang`. Matches on a case-insensitive prefix so
/// locale strings like `zh_CN.UTF-8` resolve correctly.
fn resolve_tag(tag: &str) -> Lang {
    let lower = tag.to_lowercase();
    if lower.starts_with("zh") {
        Lang::ZhCn
    } else {
        Lang::En
    }
}

pub fn set_language_tag(tag: &str) {
    CURRENT_LANG.store(resolve_tag(tag) as u8, Ordering::Relaxed);
}

pub fn current_lang() -> Lang {
    if CURRENT_LANG.load(Ordering::Relaxed) == Lang::ZhCn as u8 {
        Lang::ZhCn
    } else {
        Lang::En
    }
}

/// Resolution order from spec §6: `--lang` > `AI_Z_LANG` > `LC_ALL` > `LANG`.
/// `cli_lang` is the `--lang` value already parsed out of argv, if any.
pub fn init_ui_language(cli_lang: Option<&str>) {
    if let Some(tag) = cli_lang {
        set_language_tag(tag);
        return;
    }
    for var in ["AI_Z_LANG", "LC_ALL", "LANG"] {
        if let Ok(val) = std::env::var(var) {
            if !val.is_empty() {
                set_language_tag(&val);
                return;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MsgId {
    TimelinesNoneEnabled,
    ConfigSectionTimelines,
    ConfigReadonlySamplesPerBucket,
    ConfigReadonlySamplingRate,
    ConfigTogglePeakValues,
    ConfigReadonlyPeakWindow,
    ConfigToggleCpuUsage,
    ConfigToggleCpuHotCoreUsage,
    ConfigToggleRamUsage,
    ConfigToggleGpuUsage,
    ConfigToggleGpuMemCtrl,
    ConfigToggleVramUsage,
    ConfigToggleGpuClock,
    ConfigToggleGpuMemClock,
    ConfigToggleGpuEnc,
    ConfigToggleGpuDec,
    ConfigTogglePcieRx,
    ConfigTogglePcieTx,
    ConfigToggleDiskRead,
    ConfigToggleDiskWrite,
    ConfigToggleNetRx,
    ConfigToggleNetTx,
}

fn lookup(id: MsgId, lang: Lang) -> &'static str {
    use Lang::*;
    use MsgId::*;
    match (id, lang) {
        (TimelinesNoneEnabled, En) => "No timelines enabled. Press Enter to open settings.",
        (TimelinesNoneEnabled, ZhCn) => "未启用任何时间线。按 Enter 打开设置。",

        (ConfigSectionTimelines, En) => "Timelines",
        (ConfigSectionTimelines, ZhCn) => "时间线",

        (ConfigReadonlySamplesPerBucket, En) => "Samples / bucket",
        (ConfigReadonlySamplesPerBucket, ZhCn) => "每桶样本数",

        (ConfigReadonlySamplingRate, En) => "Sampling rate",
        (ConfigReadonlySamplingRate, ZhCn) => "采样率",

        (ConfigTogglePeakValues, En) => "Show peak values",
        (ConfigTogglePeakValues, ZhCn) => "显示峰值",

        (ConfigReadonlyPeakWindow, En) => "Peak window",
        (ConfigReadonlyPeakWindow, ZhCn) => "峰值窗口",

        (ConfigToggleCpuUsage, En) => "CPU usage",
        (ConfigToggleCpuUsage, ZhCn) => "CPU 使用率",

        (ConfigToggleCpuHotCoreUsage, En) => "Hottest core usage",
        (ConfigToggleCpuHotCoreUsage, ZhCn) => "最高核心使用率",

        (ConfigToggleRamUsage, En) => "RAM usage",
        (ConfigToggleRamUsage, ZhCn) => "内存使用率",

        (ConfigToggleGpuUsage, En) => "GPU usage",
        (ConfigToggleGpuUsage, ZhCn) => "GPU 使用率",

        (ConfigToggleGpuMemCtrl, En) => "GPU memory controller",
        (ConfigToggleGpuMemCtrl, ZhCn) => "GPU 显存控制器",

        (ConfigToggleVramUsage, En) => "VRAM usage",
        (ConfigToggleVramUsage, ZhCn) => "显存使用率",

        (ConfigToggleGpuClock, En) => "GPU clock",
        (ConfigToggleGpuClock, ZhCn) => "GPU 频率",

        (ConfigToggleGpuMemClock, En) => "GPU memory clock",
        (ConfigToggleGpuMemClock, ZhCn) => "GPU 显存频率",

        (ConfigToggleGpuEnc, En) => "GPU encoder",
        (ConfigToggleGpuEnc, ZhCn) => "GPU 编码器",

        (ConfigToggleGpuDec, En) => "GPU decoder",
        (ConfigToggleGpuDec, ZhCn) => "GPU 解码器",

        (ConfigTogglePcieRx, En) => "PCIe Rx",
        (ConfigTogglePcieRx, ZhCn) => "PCIe 接收",

        (ConfigTogglePcieTx, En) => "PCIe Tx",
        (ConfigTogglePcieTx, ZhCn) => "PCIe 发送",

        (ConfigToggleDiskRead, En) => "Disk read",
        (ConfigToggleDiskRead, ZhCn) => "磁盘读取",

        (ConfigToggleDiskWrite, En) => "Disk write",
        (ConfigToggleDiskWrite, ZhCn) => "磁盘写入",

        (ConfigToggleNetRx, En) => "Network Rx",
        (ConfigToggleNetRx, ZhCn) => "网络接收",

        (ConfigToggleNetTx, En) => "Network Tx",
        (ConfigToggleNetTx, ZhCn) => "网络发送",
    }
}

pub fn tr(id: MsgId) -> &'static str {
    lookup(id, current_lang())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zh_prefix_variants_resolve_to_zh_cn() {
        assert_eq!(resolve_tag("zh-CN"), Lang::ZhCn);
        assert_eq!(resolve_tag("zh_CN.UTF-8"), Lang::ZhCn);
        assert_eq!(resolve_tag("ZH"), Lang::ZhCn);
    }

    #[test]
    fn unknown_tag_falls_back_to_english() {
        assert_eq!(resolve_tag("fr-FR"), Lang::En);
        assert_eq!(resolve_tag(""), Lang::En);
    }

    #[test]
    fn cli_lang_takes_priority_over_env() {
        std::env::set_var("AI_Z_LANG", "zh-CN");
        init_ui_language(Some("en"));
        assert_eq!(current_lang(), Lang::En);
        std::env::remove_var("AI_Z_LANG");
    }

    #[test]
    fn tr_returns_per_language_strings() {
        set_language_tag("en");
        assert_eq!(tr(MsgId::ConfigToggleCpuUsage), "CPU usage");
        set_language_tag("zh-CN");
        assert_eq!(tr(MsgId::ConfigToggleCpuUsage), "CPU 使用率");
        set_language_tag("en");
    }
}
