//! Geographic regions and per-region upstream pools.
//!
//! The client's country narrows the upstream pool before racing; regional
//! resolvers are tried ahead of the global list.

/// Continental regions used to narrow the upstream pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Na,
    Eu,
    As,
    Oc,
    Sa,
    Af,
}

impl Region {
    pub const ALL: [Region; 6] = [
        Region::Na,
        Region::Eu,
        Region::As,
        Region::Oc,
        Region::Sa,
        Region::Af,
    ];

    /// Map an ISO 3166-1 alpha-2 country code to its region.
    ///
    /// Unknown codes fall back to [`Region::Na`].
    pub fn from_country(code: &str) -> Self {
        match code.to_ascii_uppercase().as_str() {
            "AT" | "BE" | "BG" | "CH" | "CZ" | "DE" | "DK" | "EE" | "ES" | "FI" | "FR"
            | "GB" | "GR" | "HR" | "HU" | "IE" | "IS" | "IT" | "LT" | "LU" | "LV" | "NL"
            | "NO" | "PL" | "PT" | "RO" | "RS" | "SE" | "SI" | "SK" | "UA" => Region::Eu,
            "AE" | "BD" | "CN" | "HK" | "ID" | "IL" | "IN" | "JP" | "KR" | "MY" | "PH"
            | "PK" | "SA" | "SG" | "TH" | "TR" | "TW" | "VN" => Region::As,
            "AU" | "FJ" | "NC" | "NZ" | "PG" => Region::Oc,
            "AR" | "BO" | "BR" | "CL" | "CO" | "EC" | "GY" | "PE" | "PY" | "SR" | "UY"
            | "VE" => Region::Sa,
            "DZ" | "EG" | "ET" | "GH" | "KE" | "MA" | "NG" | "SN" | "TN" | "TZ" | "UG"
            | "ZA" | "ZW" => Region::Af,
            _ => Region::Na,
        }
    }
}

/// Regional resolver pool, tried before the global list.
///
/// Order within a pool is preference order; selection is stable, so it
/// survives ranking ties.
pub fn regional_upstreams(region: Region) -> &'static [&'static str] {
    match region {
        Region::Na => &[
            "https://cloudflare-dns.com/dns-query",
            "https://dns.google/dns-query",
        ],
        Region::Eu => &[
            "https://dns.quad9.net/dns-query",
            "https://doh.ffmuc.net/dns-query",
        ],
        Region::As => &[
            "https://public.dns.iij.jp/dns-query",
            "https://101.101.101.101/dns-query",
        ],
        Region::Oc => &[
            "https://cloudflare-dns.com/dns-query",
            "https://dns.quad9.net/dns-query",
        ],
        Region::Sa => &[
            "https://cloudflare-dns.com/dns-query",
            "https://dns.google/dns-query",
        ],
        Region::Af => &[
            "https://dns.quad9.net/dns-query",
            "https://cloudflare-dns.com/dns-query",
        ],
    }
}
