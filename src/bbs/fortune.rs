//! Fortune cookies for the utilities menu.
//!
//! Stateless: each call picks one entry at random with `rand::thread_rng()`.
//! Every entry fits comfortably inside a single mesh frame.
//!
//! ```
//! use tcbbs::bbs::fortune::get_fortune;
//!
//! let fortune = get_fortune();
//! assert!(!fortune.is_empty());
//! ```

use rand::Rng;

/// Longest fortune allowed, in bytes.
pub const MAX_FORTUNE_BYTES: usize = 200;

const FORTUNES: [&str; 40] = [
    // Radio and mesh
    "The best antenna is the one you actually put up.",
    "Height is might. Get your antenna off the ground.",
    "A mesh is only as strong as its most patient router.",
    "Store and forward: the original asynchronous messaging.",
    "Your packet will arrive. Eventually. Probably.",
    "Low power, long range, great patience.",
    "When all else fails, there is still radio.",
    "Line of sight is the cheapest amplifier you will ever buy.",
    "Every hop is a small act of trust.",
    "73 is not a number, it is a farewell.",
    "Check your SWR before you check your ego.",
    "The ionosphere does not care about your schedule.",
    "Never underestimate a well-placed solar panel.",
    "A charged battery is a happy node.",
    "Sometimes the best message is the one you did not need to send.",
    // Computing
    "There are only two hard things in computing: cache invalidation and naming things.",
    "It works on my node.",
    "Weeks of coding can save you hours of planning.",
    "Simplicity is prerequisite for reliability. - Edsger Dijkstra",
    "Premature optimization is the root of all evil. - Donald Knuth",
    "Any sufficiently advanced technology is indistinguishable from magic. - Arthur C. Clarke",
    "Talk is cheap. Show me the code. - Linus Torvalds",
    "Programs must be written for people to read. - Harold Abelson",
    "The network is reliable. (Said no one who ran a mesh.)",
    "Have you tried turning it off and on again?",
    // Wisdom
    "The journey of a thousand miles begins with one step. - Lao Tzu",
    "Well done is better than well said. - Benjamin Franklin",
    "Fortune favors the prepared mind. - Louis Pasteur",
    "It always seems impossible until it is done. - Nelson Mandela",
    "What we know is a drop, what we do not know is an ocean. - Isaac Newton",
    "Do what you can, with what you have, where you are. - Theodore Roosevelt",
    "The best time to plant a tree was 20 years ago. The second best time is now.",
    "Patience is bitter, but its fruit is sweet.",
    "Not all who wander are lost. - J.R.R. Tolkien",
    "Be prepared. - Scout motto",
    // Humor
    "You will receive a message. It will say 'test'.",
    "A clean desk is a sign of a cluttered drawer.",
    "The early bird gets the worm, but the second mouse gets the cheese.",
    "Today is a good day to update your firmware. Or not.",
    "Your lucky numbers are 915 and 868.",
];

/// Return a random fortune.
pub fn get_fortune() -> &'static str {
    let mut rng = rand::thread_rng();
    FORTUNES[rng.gen_range(0..FORTUNES.len())]
}

pub fn fortune_count() -> usize {
    FORTUNES.len()
}
