//! Built-in suppression rules.
//!
//! Rule syntax:
//! - Patterns are case-insensitive regular expressions searched anywhere in
//!   every field of a record.
//! - `\` is a literal path separator; it is escaped before compilation, so
//!   `\*` means "zero or more separators".
//! - `%Name%` expands to the environment value on the analysis machine.
//! - Do not end a rule with a bare `\`.

/// Noise sources suppressed in every scope
pub const GLOBAL: &[&str] = &[
    r"VMwareUser.exe",
    r"CaptureBAT.exe",
    r"SearchIndexer.exe",
    r"Fakenet.exe",
    r"idaq.exe",
    r"ngen.exe",
    r"ngentask.exe",
];

pub const PROCESS: &[&str] = &[
    r"%SystemRoot%\system32\wbem\wmiprvse.exe",
    r"%SystemRoot%\system32\wscntfy.exe",
    r"procmon.exe",
    r"wuauclt.exe",
    r"jqs.exe",
    r"TCPView.exe",
];

pub const FILE: &[&str] = &[
    r"procmon.exe",
    r"Desired Access: Execute/Traverse",
    r"Desired Access: Synchronize",
    r"Desired Access: Generic Read/Execute",
    r"Desired Access: Read EA",
    r"Desired Access: Read Data/List",
    r"Desired Access: Generic Read, ",
    r"Desired Access: Read Attributes",
    r"Google\Chrome\User Data\.*.tmp",
    r"wuauclt.exe",
    r"wmiprvse.exe",
    r"Microsoft\Windows\Explorer\thumbcache_.*.db",
    r"Thumbs.db$",
    r"%AllUsersProfile%\Application Data\Microsoft\OFFICE\DATA",
    r"%AppData%\Microsoft\Proof\*",
    r"%AppData%\Microsoft\Templates\*",
    r"%LocalAppData%\Google\Drive\sync_config.db*",
    r"%ProgramFiles%\Capture\*",
    r"%SystemDrive%\Python",
    r"%SystemRoot%\assembly",
    r"%SystemRoot%\Microsoft.NET\Framework64",
    r"%SystemRoot%\Prefetch\*",
    r"%SystemRoot%\system32\wbem\Logs\*",
    r"%SystemRoot%\System32\LogFiles\Scm",
    r"%SystemRoot%\System32\Tasks\Microsoft\Windows",
    r"%UserProfile%$",
    r"%UserProfile%\AppData\LocalLow$",
    r"%UserProfile%\Recent\*",
    r"%UserProfile%\Local Settings\History\History.IE5\*",
];

pub const REGISTRY: &[&str] = &[
    r"CaptureProcessMonitor",
    r"consent.exe",
    r"procmon.exe",
    r"verclsid.exe",
    r"wmiprvse.exe",
    r"wscntfy.exe",
    r"wuauclt.exe",
    r"PROCMON",
    r"HKCR$",
    r"HKCR\AllFilesystemObjects\shell",
    r"HKCU$",
    r"HKCU\Printers\DevModePerUser",
    r"HKCU\SessionInformation\ProgramCount",
    r"HKCU\Software$",
    r"HKCU\Software\Classes\Software\Microsoft\Windows\CurrentVersion\Deployment\SideBySide",
    r"HKCU\Software\Classes\Local Settings\MuiCache\*",
    r"HKCU\Software\Microsoft\Calc$",
    r"HKCU\Software\Microsoft\.*\Window_Placement",
    r"HKCU\Software\Microsoft\Internet Explorer\TypedURLs",
    r"HKCU\Software\Microsoft\Notepad",
    r"HKCU\Software\Microsoft\Office",
    r"HKCU\Software\Microsoft\Shared Tools",
    r"HKCU\Software\Microsoft\SystemCertificates\Root$",
    r"HKCU\Software\Microsoft\Windows\CurrentVersion\Applets",
    r"HKCU\Software\Microsoft\Windows\CurrentVersion\Explorer\CIDOpen",
    r"HKCU\Software\Microsoft\Windows\CurrentVersion\Explorer\Modules",
    r"HKCU\Software\Microsoft\Windows\CurrentVersion\Explorer\MountPoints2",
    r"HKCU\Software\Microsoft\Windows\CurrentVersion\Explorer\RunMRU",
    r"HKCU\Software\Microsoft\Windows\CurrentVersion\Explorer\SessionInfo",
    r"HKCU\Software\Microsoft\Windows\CurrentVersion\Explorer\StartPage",
    r"HKCU\Software\Microsoft\Windows\CurrentVersion\Explorer\StartPage2",
    r"HKCU\Software\Microsoft\Windows\Currentversion\Explorer\StreamMRU",
    r"HKCU\Software\Microsoft\Windows\Currentversion\Explorer\Streams",
    r"HKCU\Software\Microsoft\Windows\CurrentVersion\Group Policy",
    r"HKCU\Software\Microsoft\Windows\Shell",
    r"HKCU\Software\Microsoft\Windows\Shell\BagMRU",
    r"HKCU\Software\Microsoft\Windows\Shell\Bags",
    r"HKCU\Software\Microsoft\Windows\ShellNoRoam\MUICache",
    r"HKCU\Software\Microsoft\Windows\ShellNoRoam\BagMRU",
    r"HKCU\Software\Microsoft\Windows\ShellNoRoam\Bags",
    r"HKCU\Software\Policies$",
    r"HKCU\Software\Policies\Microsoft$",
    r"HKLM$",
    r"HKLM\.*\Enum$",
    r"HKLM\SOFTWARE$",
    r"HKLM\SOFTWARE\Microsoft\Cryptography\RNG\Seed",
    r"HKLM\SOFTWARE\Microsoft$",
    r"HKLM\SOFTWARE\Policies$",
    r"HKLM\SOFTWARE\Policies\Microsoft$",
    r"HKLM\SOFTWARE\MICROSOFT\Dfrg\Statistics",
    r"HKLM\SOFTWARE\MICROSOFT\SystemCertificates$",
    r"HKLM\Software\Microsoft\Windows\CurrentVersion\Installer\UserData\S-1-5-18\Products",
    r"HKLM\Software\Microsoft\Windows\CurrentVersion\Internet Settings\Cache\Paths\*",
    r"HKLM\SOFTWARE\Microsoft\Windows\CurrentVersion\MMDevices\Audio\Render",
    r"HKLM\Software\Microsoft\Windows\CurrentVersion\Shell Extensions",
    r"HKLM\Software\Microsoft\WBEM",
    r"HKLM\Software\Microsoft\Windows NT\CurrentVersion\Prefetcher\*",
    r"HKLM\Software\Microsoft\Windows NT\CurrentVersion\Tracing\*",
    r"HKLM\System\CurrentControlSet\Control\CLASS\{4D36E968-E325-11CE-BFC1-08002BE10318}",
    r"HKLM\System\CurrentControlSet\Control\DeviceClasses",
    r"HKLM\System\CurrentControlSet\Control\MediaProperties",
    r"HKLM\System\CurrentControlSet\Enum\*",
    r"HKLM\System\CurrentControlSet\Services\CaptureRegistryMonitor",
    r"HKLM\System\CurrentControlSet\Services\Eventlog\*",
    r"HKLM\System\CurrentControlSet\Services\Tcpip\Parameters",
    r"HKLM\System\CurrentControlSet\Services\WinSock2\Parameters",
    r"HKLM\System\CurrentControlSet\Services\VSS\Diag",
    r"LEGACY_CAPTUREREGISTRYMONITOR",
    r"Software\Microsoft\Multimedia\Audio$",
    r"Software\Microsoft\Multimedia\Audio Compression Manager",
    r"Software\Microsoft\Windows\CurrentVersion\Explorer\MenuOrder",
    r"Software\Microsoft\Windows\ShellNoRoam\Bags",
    r"Software\Microsoft\Windows\ShellNoRoam\BagMRU",
    r"Software\Microsoft\Windows\CurrentVersion\Explorer\FileExts\.doc",
    r"Software\Microsoft\Windows\CurrentVersion\Explorer\RecentDocs",
    r"Software\Microsoft\Windows\CurrentVersion\Explorer\Shell Folders",
    r"Software\Microsoft\Windows\CurrentVersion\Explorer\User Shell Folders",
    r"UserAssist\{5E6AB780-7743-11CF-A12B-00AA004AE837}",
    r"UserAssist\{75048700-EF1F-11D0-9888-006097DEACF9}",
    r"UserAssist\{CEBFF5CD-ACE2-4F4F-9178-9926F41749EA}",
];

/// Hasp dongle beacons
pub const NETWORK: &[&str] = &[r"hasplms.exe"];

/// MD5 digests of files the analysis VM drops on its own
pub const HASHES: &[&str] = &[
    "f8f0d25ca553e39dde485d8fc7fcce89",
    "b60dddd2d63ce41cb8c487fcfbb6419e",
    "6fe42512ab1b89f32a7407f261b1d2d0",
    "8b1f3320aebb536e021a5014409862de",
    "b26b135ff1b9f60c9388b4a7d16f600b",
    "355edbb4d412b01f1740c17e3f50fa00",
    "d4502f124289a31976130cccb014c9aa",
    "81faefc42d0b236c62c3401558867faa",
    "e40fcf943127ddc8fd60554b722d762b",
    "0da85218e92526972a821587e6a8bf8f",
];
