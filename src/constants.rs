use std::collections::HashMap;

pub const ASCII_LOWER: [char; 26] = [
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's',
    't', 'u', 'v', 'w', 'x', 'y', 'z',
];

pub const VOWELS: [char; 6] = ['a', 'e', 'i', 'o', 'u', 'y'];

pub const BIT_MASKS: [u32; 8] = [1, 2, 4, 8, 16, 32, 64, 128];

// Lowercase-only confusables. Capital forms from common homograph lists are
// folded to their lowercase glyph so candidates stay comparable with the
// lowercase names found in certificates.
const GLYPHS: &[(char, &str)] = &[
    ('a', "àáâãäåɑаạǎăȧαａ"),
    ('b', "dʙьɓбßβᛒḅḃᵬ"),
    ('c', "ϲсƈċćçｃ"),
    ('d', "bԁժɗđ"),
    ('e', "éêëēĕěėеẹęєϵҽ"),
    ('f', "ϝƒғ"),
    ('g', "qɢɡԍġğցǵģ"),
    ('h', "һհꮒн"),
    ('i', "1lꭵíïıɩιꙇǐĭ"),
    ('j', "јʝϳɉ"),
    ('k', "κ"),
    ('l', "1iɫł"),
    ('m', "nṃᴍмɱ"),
    ('n', "mrń"),
    ('o', "0οоօȯọỏơóöӧｏ"),
    ('p', "ρрƿϸþ"),
    ('q', "gզԛգʠ"),
    ('r', "ʀгᴦɼɽ"),
    ('s', "ⴝꮪʂśѕ"),
    ('t', "τтţ"),
    ('u', "μυսцᴜǔŭ"),
    ('v', "ѵνṿṽ"),
    ('w', "ѡաԝ"),
    ('x', "хҳẋ"),
    ('y', "ʏγуүý"),
    ('z', "ʐżźᴢ"),
];

const KEYBOARD_EN: &[(char, &str)] = &[
    ('q', "12wa"), ('2', "3wq1"), ('3', "4ew2"), ('4', "5re3"), ('5', "6tr4"), ('6', "7yt5"),
    ('7', "8uy6"), ('8', "9iu7"), ('9', "0oi8"), ('0', "po9"),
    ('w', "3esaq2"), ('e', "4rdsw3"), ('r', "5tfde4"), ('t', "6ygfr5"), ('y', "7uhgt6"),
    ('u', "8ijhy7"), ('i', "9okju8"), ('o', "0plki9"), ('p', "lo0"),
    ('a', "qwsz"), ('s', "edxzaw"), ('d', "rfcxse"), ('f', "tgvcdr"), ('g', "yhbvft"),
    ('h', "ujnbgy"), ('j', "ikmnhu"), ('k', "olmji"), ('l', "kop"),
    ('z', "asx"), ('x', "zsdc"), ('c', "xdfv"), ('v', "cfgb"), ('b', "vghn"), ('n', "bhjm"),
    ('m', "njk"),
];

const KEYBOARD_DE: &[(char, &str)] = &[
    ('q', "12wa"), ('w', "23esaq"), ('e', "34rdsw"), ('r', "45tfde"), ('t', "56zgfr"),
    ('z', "67uhgt"), ('u', "78ijhz"), ('i', "89okju"), ('o', "90plki"), ('p', "0ßüölo"),
    ('ü', "ß+äöp"), ('a', "qwsy"), ('s', "wedxya"), ('d', "erfcxs"), ('f', "rtgvcd"),
    ('g', "tzhbvf"), ('h', "zujnbg"), ('j', "uikmnh"), ('k', "iolmj"), ('l', "opök"),
    ('ö', "püäl-"), ('ä', "ü-ö"), ('y', "asx"), ('x', "sdcy"), ('c', "dfvx"), ('v', "fgbc"),
    ('b', "ghnv"), ('n', "hjmb"), ('m', "jkn"),
    ('1', "2q"), ('2', "13wq"), ('3', "24ew"), ('4', "35re"), ('5', "46tr"), ('6', "57zt"),
    ('7', "68uz"), ('8', "79iu"), ('9', "80oi"), ('0', "9ßpo"), ('ß', "0üp"),
];

const KEYBOARD_ES: &[(char, &str)] = &[
    ('q', "12wa"), ('w', "23esaq"), ('e', "34rdsw"), ('r', "45tfde"), ('t', "56ygfr"),
    ('y', "67uhgt"), ('u', "78ijhy"), ('i', "89okju"), ('o', "90plki"), ('p', "0loñ"),
    ('a', "qwsz"), ('s', "wedxza"), ('d', "erfcxs"), ('f', "rtgvcd"), ('g', "tyhbvf"),
    ('h', "yujnbg"), ('j', "uikmnh"), ('k', "iolmj"), ('l', "opkñ"), ('ñ', "pl"),
    ('z', "asx"), ('x', "sdcz"), ('c', "dfvx"), ('v', "fgbc"), ('b', "ghnv"), ('n', "hjmb"),
    ('m', "jkn"),
    ('1', "2q"), ('2', "13wq"), ('3', "24ew"), ('4', "35re"), ('5', "46tr"), ('6', "57yt"),
    ('7', "68uy"), ('8', "79iu"), ('9', "80oi"), ('0', "9po"),
];

const KEYBOARD_FR: &[(char, &str)] = &[
    ('a', "12zqé"), ('z', "23eésaq"), ('e', "34rdsz"), ('r', "45tfde"), ('t', "56ygfr-"),
    ('y', "67uhgtè-"), ('u', "78ijhyè"), ('i', "89okjuç"), ('o', "90plkiçà"), ('p', "0àlo"),
    ('q', "azsw"), ('s', "zedxwq"), ('d', "erfcxs"), ('f', "rtgvcd"), ('g', "tzhbvf"),
    ('h', "zujnbg"), ('j', "uikmnh"), ('k', "iolmj"), ('l', "opmk"), ('m', "pùl"),
    ('w', "qsx"), ('x', "sdcw"), ('c', "dfvx"), ('v', "fgbc"), ('b', "ghnv"), ('n', "hjb"),
    ('1', "2aé"), ('2', "13azé"), ('3', "24ewé"), ('4', "35re"), ('5', "46tr"), ('6', "57ytè"),
    ('7', "68uyè"), ('8', "79iuèç"), ('9', "80oiçà"), ('0', "9àçpo"),
];

fn char_table(entries: &[(char, &'static str)]) -> HashMap<char, Vec<char>> {
    entries
        .iter()
        .map(|&(key, chars)| (key, chars.chars().collect()))
        .collect()
}

lazy_static! {
    pub static ref HOMOGLYPHS: HashMap<char, Vec<char>> = char_table(GLYPHS);

    // English, German, Spanish, French
    pub static ref KEYBOARD_LAYOUTS: Vec<HashMap<char, Vec<char>>> = vec![
        char_table(KEYBOARD_EN),
        char_table(KEYBOARD_DE),
        char_table(KEYBOARD_ES),
        char_table(KEYBOARD_FR),
    ];
}
