//! Built-in script catalog.
//!
//! The toolbox ships a fixed set of maintenance scripts hosted in a public
//! repository. Entries are (label, URL) pairs, consumed read-only; there is
//! no config file and no persistence.

use serde::{Deserialize, Serialize};

/// One downloadable script: a display label and the URL serving its body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptSource {
    pub label: String,
    pub url: String,
}

const RAW_BASE: &str = "https://raw.githubusercontent.com/deep1ne8/misc/main/Scripts";

const BUILTIN: &[(&str, &str)] = &[
    ("Disk Cleaner", "DiskCleaner.ps1"),
    ("Enable Files On Demand", "EnableFilesOnDemand.ps1"),
    ("Download & Install Package", "DownloadandInstallPackage.ps1"),
    ("Check User Profile", "CheckUserProfileIssue.ps1"),
    ("Dell Bloatware Remover", "BloatWareRemover.ps1"),
    ("Reset & Install Windows Update", "InstallWindowsUpdate.ps1"),
    ("Windows System Repair", "WindowsSystemRepair.ps1"),
    ("Reset Windows Search DB", "ResetandClearWindowsSearchDB.ps1"),
    ("Install MS Projects", "InstallMSProjects.ps1"),
    ("Check Drive Space", "CheckDriveSpace.ps1"),
    ("Internet Speed Test", "InternetSpeedTest.ps1"),
    ("Internet Latency Test", "InternetLatencyTest.ps1"),
    ("Monitor Troubleshooter", "WorkPaperMonitorTroubleShooter.ps1"),
];

/// The full catalog, in display order.
pub fn builtin() -> Vec<ScriptSource> {
    BUILTIN
        .iter()
        .map(|(label, file)| ScriptSource {
            label: (*label).to_string(),
            url: format!("{}/{}", RAW_BASE, file),
        })
        .collect()
}

/// Look up an entry by case-insensitive label or by 1-based index.
pub fn find<'a>(entries: &'a [ScriptSource], query: &str) -> Option<&'a ScriptSource> {
    if let Ok(index) = query.parse::<usize>() {
        if index >= 1 {
            return entries.get(index - 1);
        }
        return None;
    }
    entries.iter().find(|s| s.label.eq_ignore_ascii_case(query))
}
